//! Type inspection, conversion, `var_dump` and JSON.

use super::{arg, expect_args};
use crate::error::VmResult;
use crate::vm::CallContext;
use quarry_codec::{format_real, from_json_str, to_json_pretty, to_json_string, ArrayKey, Value};

pub(super) fn gettype(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::str(args[0].type_name()))
}

fn check(ctx: &CallContext<'_>, args: &[Value], test: fn(&Value) -> bool) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::Bool(test(&args[0])))
}

pub(super) fn is_null(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, Value::is_null)
}

pub(super) fn is_bool(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::Bool(_)))
}

pub(super) fn is_int(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::Int(_)))
}

pub(super) fn is_float(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::Real(_)))
}

pub(super) fn is_string(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::String(_)))
}

pub(super) fn is_array(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::Array(_)))
}

pub(super) fn is_numeric(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| v.as_numeric().is_some())
}

pub(super) fn is_scalar(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| {
        matches!(
            v,
            Value::Bool(_) | Value::Int(_) | Value::Real(_) | Value::String(_)
        )
    })
}

pub(super) fn is_resource(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    check(ctx, args, |v| matches!(v, Value::Resource(_)))
}

pub(super) fn intval(_ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Int(arg(args, 0).to_int()))
}

pub(super) fn floatval(_ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Real(arg(args, 0).to_real()))
}

pub(super) fn strval(_ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    Ok(Value::String(arg(args, 0).to_bytes()))
}

pub(super) fn boolval(_ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Bool(arg(args, 0).to_bool()))
}

/// Prints a structured description of every argument.
pub(super) fn var_dump(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let mut out = Vec::new();
    for value in args {
        dump(&mut out, value, 0);
    }
    ctx.echo(&out);
    Ok(Value::Null)
}

fn dump(out: &mut Vec<u8>, value: &Value, indent: usize) {
    match value {
        Value::Null => out.extend_from_slice(b"NULL\n"),
        Value::Bool(b) => out.extend_from_slice(format!("bool({b})\n").as_bytes()),
        Value::Int(i) => out.extend_from_slice(format!("int({i})\n").as_bytes()),
        Value::Real(r) => out.extend_from_slice(format!("float({})\n", format_real(*r)).as_bytes()),
        Value::String(s) => {
            out.extend_from_slice(format!("string({}) \"", s.len()).as_bytes());
            out.extend_from_slice(s);
            out.extend_from_slice(b"\"\n");
        }
        Value::Array(map) => {
            out.extend_from_slice(format!("array({}) {{\n", map.len()).as_bytes());
            let pad = " ".repeat(indent + 2);
            for (key, item) in map.iter() {
                out.extend_from_slice(pad.as_bytes());
                match key {
                    ArrayKey::Int(i) => out.extend_from_slice(format!("[{i}]=>\n").as_bytes()),
                    ArrayKey::Str(s) => {
                        out.extend_from_slice(b"[\"");
                        out.extend_from_slice(s);
                        out.extend_from_slice(b"\"]=>\n");
                    }
                }
                out.extend_from_slice(pad.as_bytes());
                dump(out, item, indent + 2);
            }
            out.extend_from_slice(" ".repeat(indent).as_bytes());
            out.extend_from_slice(b"}\n");
        }
        Value::Resource(id) => out.extend_from_slice(format!("resource(#{id})\n").as_bytes()),
    }
}

/// `json_encode($value [, $pretty])`.
pub(super) fn json_encode(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let text = if arg(args, 1).to_bool() {
        to_json_pretty(&args[0]).map_err(|e| ctx.error(e))?
    } else {
        to_json_string(&args[0])
    };
    Ok(Value::from(text))
}

/// `json_decode($text)`; null when the text is not valid JSON.
pub(super) fn json_decode(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let text = args[0].to_bytes();
    let Ok(text) = std::str::from_utf8(&text) else {
        return Ok(Value::Null);
    };
    Ok(from_json_str(text).unwrap_or_default())
}
