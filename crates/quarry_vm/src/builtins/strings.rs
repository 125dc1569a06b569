//! Byte-string functions. Case mapping is ASCII only.

use super::{arg, expect_args, SIZE_LIMIT};
use crate::error::VmResult;
use crate::vm::CallContext;
use bytes::Bytes;
use quarry_codec::Value;

const TRIM_DEFAULT: &[u8] = b" \t\n\r\0\x0B";

pub(super) fn strlen(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::Int(args[0].to_bytes().len() as i64))
}

pub(super) fn strtolower(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::from(args[0].to_bytes().to_ascii_lowercase()))
}

pub(super) fn strtoupper(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::from(args[0].to_bytes().to_ascii_uppercase()))
}

/// Resolves a possibly negative offset against `len`, clamped to `0..=len`.
fn offset(at: i64, len: usize) -> usize {
    let len = len as i64;
    let at = if at < 0 { (len + at).max(0) } else { at.min(len) };
    at as usize
}

/// `substr($s, $start [, $length])`. A negative length leaves that many
/// bytes off the end.
pub(super) fn substr(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let s = args[0].to_bytes();
    let start = offset(args[1].to_int(), s.len());
    let end = match args.get(2) {
        None | Some(Value::Null) => s.len(),
        Some(length) => {
            let length = length.to_int();
            if length < 0 {
                offset(length, s.len())
            } else {
                start.saturating_add(length as usize).min(s.len())
            }
        }
    };
    if end <= start {
        return Ok(Value::str(""));
    }
    Ok(Value::String(s.slice(start..end)))
}

pub(super) fn trim(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let s = args[0].to_bytes();
    let set = match args.get(1) {
        Some(chars) => chars.to_bytes(),
        None => Bytes::from_static(TRIM_DEFAULT),
    };
    let start = s.iter().position(|b| !set.contains(b)).unwrap_or(s.len());
    let end = s
        .iter()
        .rposition(|b| !set.contains(b))
        .map_or(start, |i| i + 1);
    Ok(Value::String(s.slice(start..end.max(start))))
}

fn split<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut rest = haystack;
    while let Some(at) = find(rest, delimiter, 0) {
        pieces.push(&rest[..at]);
        rest = &rest[at + delimiter.len()..];
    }
    pieces.push(rest);
    pieces
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// `explode($delimiter, $s [, $limit])`.
pub(super) fn explode(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let delimiter = args[0].to_bytes();
    if delimiter.is_empty() {
        return Err(ctx.error("empty delimiter"));
    }
    let s = args[1].to_bytes();
    let mut pieces: Vec<Value> = split(&s, &delimiter)
        .into_iter()
        .map(|p| Value::bytes(Bytes::copy_from_slice(p)))
        .collect();
    match args.get(2).map(Value::to_int) {
        Some(limit) if limit > 0 && pieces.len() > limit as usize => {
            // the last piece keeps the unsplit remainder
            let keep = limit as usize - 1;
            let consumed: usize = pieces[..keep]
                .iter()
                .map(|p| p.to_bytes().len() + delimiter.len())
                .sum();
            pieces.truncate(keep);
            pieces.push(Value::String(s.slice(consumed..)));
        }
        Some(limit) if limit < 0 => {
            let drop = limit.unsigned_abs() as usize;
            pieces.truncate(pieces.len().saturating_sub(drop));
        }
        _ => {}
    }
    Ok(Value::list(pieces))
}

/// `implode($glue, $array)`; `implode($array)` joins with nothing.
pub(super) fn implode(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let (glue, items) = match (arg(args, 0), arg(args, 1)) {
        (Value::Array(items), Value::Null) => (Bytes::new(), items),
        (Value::Array(items), glue) | (glue, Value::Array(items)) => (glue.to_bytes(), items),
        _ => return Err(ctx.error("expects an array")),
    };
    let mut out = Vec::new();
    for (i, item) in items.values().enumerate() {
        if i > 0 {
            out.extend_from_slice(&glue);
        }
        out.extend_from_slice(&item.to_bytes());
    }
    Ok(Value::from(out))
}

fn replace_all(subject: &[u8], search: &[u8], replace: &[u8]) -> Vec<u8> {
    if search.is_empty() {
        return subject.to_vec();
    }
    split(subject, search).join(replace)
}

/// `str_replace($search, $replace, $subject)`. Search may be an array, with
/// replacements taken pairwise from an array or repeated from a string.
/// An array subject is processed element by element.
pub(super) fn str_replace(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 3)?;
    let pairs: Vec<(Bytes, Bytes)> = match (&args[0], &args[1]) {
        (Value::Array(search), Value::Array(replace)) => search
            .values()
            .enumerate()
            .map(|(i, s)| {
                let r = replace.values().nth(i).map(Value::to_bytes).unwrap_or_default();
                (s.to_bytes(), r)
            })
            .collect(),
        (Value::Array(search), replace) => search
            .values()
            .map(|s| (s.to_bytes(), replace.to_bytes()))
            .collect(),
        (search, replace) => vec![(search.to_bytes(), replace.to_bytes())],
    };
    let apply = |subject: &Value| {
        let mut text = subject.to_bytes().to_vec();
        for (search, replace) in &pairs {
            text = replace_all(&text, search, replace);
        }
        Value::from(text)
    };
    match &args[2] {
        Value::Array(subjects) => Ok(Value::array(
            subjects
                .iter()
                .map(|(k, v)| (k.clone(), apply(v)))
                .collect(),
        )),
        subject => Ok(apply(subject)),
    }
}

pub(super) fn str_repeat(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let times = args[1].to_int();
    if times < 0 {
        return Err(ctx.error("repeat count must not be negative"));
    }
    let bytes = args[0].to_bytes();
    let len = usize::try_from(times)
        .ok()
        .and_then(|times| bytes.len().checked_mul(times))
        .filter(|&len| len <= SIZE_LIMIT)
        .ok_or_else(|| ctx.error("result is too large"))?;
    if len == 0 {
        return Ok(Value::str(""));
    }
    Ok(Value::from(bytes.repeat(times as usize)))
}

/// `strpos($haystack, $needle [, $offset])`: byte offset or `false`.
pub(super) fn strpos(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let haystack = args[0].to_bytes();
    let needle = args[1].to_bytes();
    let from = offset(arg(args, 2).to_int(), haystack.len());
    Ok(match find(&haystack, &needle, from) {
        Some(at) => Value::Int(at as i64),
        None => Value::Bool(false),
    })
}
