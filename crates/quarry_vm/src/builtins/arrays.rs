//! Array and math functions.

use super::{arg, expect_args, SIZE_LIMIT};
use crate::error::VmResult;
use crate::vm::CallContext;
use quarry_codec::{compare, loose_eq, strict_eq, ArrayKey, ArrayMap, Number, Value};
use std::cmp::Ordering;

fn array<'v>(ctx: &CallContext<'_>, value: &'v Value) -> VmResult<&'v ArrayMap> {
    value
        .as_array()
        .ok_or_else(|| ctx.error(format!("expects an array, got {}", value.type_name())))
}

pub(super) fn count(_ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let n = match arg(args, 0) {
        Value::Array(map) => map.len() as i64,
        Value::Null => 0,
        _ => 1,
    };
    Ok(Value::Int(n))
}

pub(super) fn array_keys(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let map = array(ctx, &args[0])?;
    Ok(Value::list(map.keys().map(ArrayKey::to_value)))
}

pub(super) fn array_values(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let map = array(ctx, &args[0])?;
    Ok(Value::list(map.values().cloned()))
}

/// Integer keys are renumbered; string keys from later arrays overwrite.
pub(super) fn array_merge(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    let mut merged = ArrayMap::new();
    for value in args {
        for (key, item) in array(ctx, value)?.iter() {
            match key {
                ArrayKey::Int(_) => {
                    merged.push(item.clone());
                }
                ArrayKey::Str(_) => {
                    merged.insert(key.clone(), item.clone());
                }
            }
        }
    }
    Ok(Value::array(merged))
}

/// `in_array($needle, $array [, $strict])`.
pub(super) fn in_array(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let map = array(ctx, &args[1])?;
    let eq = if arg(args, 2).to_bool() {
        strict_eq
    } else {
        loose_eq
    };
    Ok(Value::Bool(map.values().any(|v| eq(v, &args[0]))))
}

pub(super) fn array_key_exists(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let map = array(ctx, &args[1])?;
    Ok(Value::Bool(map.contains_key(&ArrayKey::from_value(&args[0]))))
}

/// `range($start, $end [, $step])`, inclusive in either direction. Produces
/// floats when any argument is a float.
pub(super) fn range(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let step = match args.get(2) {
        Some(step) => step.to_number(),
        None => Number::Int(1),
    };
    if step.as_f64() == 0.0 || step.as_f64().is_nan() {
        return Err(ctx.error("step must not be zero"));
    }
    match (args[0].to_number(), args[1].to_number(), step) {
        (Number::Int(start), Number::Int(end), Number::Int(step)) => {
            let step = step.unsigned_abs();
            let span = start.abs_diff(end);
            let steps = span / step;
            if steps >= SIZE_LIMIT as u64 {
                return Err(ctx.error("range is too large"));
            }
            let len = steps + 1;
            let descending = end < start;
            let items = (0..len).map(|i| {
                let delta = (i * step) as i128;
                let value = if descending {
                    i128::from(start) - delta
                } else {
                    i128::from(start) + delta
                };
                Value::Int(value as i64)
            });
            Ok(Value::list(items))
        }
        (start, end, step) => {
            let (start, end, step) = (start.as_f64(), end.as_f64(), step.as_f64().abs());
            let len = ((end - start).abs() / step).floor() + 1.0;
            if !len.is_finite() || len > SIZE_LIMIT as f64 {
                return Err(ctx.error("range is too large"));
            }
            let sign = if end < start { -1.0 } else { 1.0 };
            let items = (0..len as usize).map(|i| Value::Real(start + sign * step * i as f64));
            Ok(Value::list(items))
        }
    }
}

/// `array_reverse($array [, $preserve_keys])`. String keys are always kept.
pub(super) fn array_reverse(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let map = array(ctx, &args[0])?;
    let preserve = arg(args, 1).to_bool();
    let mut out = ArrayMap::new();
    for (key, item) in map.iter().rev() {
        match key {
            ArrayKey::Int(_) if !preserve => {
                out.push(item.clone());
            }
            _ => {
                out.insert(key.clone(), item.clone());
            }
        }
    }
    Ok(Value::array(out))
}

pub(super) fn abs(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(match args[0].to_number() {
        Number::Int(i) => i
            .checked_abs()
            .map_or(Value::Real((i as f64).abs()), Value::Int),
        Number::Real(r) => Value::Real(r.abs()),
    })
}

/// Candidates for `min`/`max`: the elements of a single array argument, or
/// the arguments themselves.
fn extreme(ctx: &CallContext<'_>, args: &[Value], wanted: Ordering) -> VmResult<Value> {
    let candidates: Vec<&Value> = match args {
        [Value::Array(map)] => map.values().collect(),
        _ => args.iter().collect(),
    };
    let mut best = candidates
        .first()
        .copied()
        .ok_or_else(|| ctx.error("needs at least one value"))?;
    for value in &candidates[1..] {
        if compare(value, best, false) == wanted {
            best = value;
        }
    }
    Ok(best.clone())
}

pub(super) fn min(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    extreme(ctx, args, Ordering::Less)
}

pub(super) fn max(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    extreme(ctx, args, Ordering::Greater)
}

fn real(ctx: &CallContext<'_>, args: &[Value], f: fn(f64) -> f64) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    Ok(Value::Real(f(args[0].to_real())))
}

pub(super) fn floor(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    real(ctx, args, f64::floor)
}

pub(super) fn ceil(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    real(ctx, args, f64::ceil)
}

pub(super) fn sqrt(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    real(ctx, args, f64::sqrt)
}

/// `round($x [, $precision])`, halves away from zero.
pub(super) fn round(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 1)?;
    let x = args[0].to_real();
    let precision = arg(args, 1).to_int().clamp(-15, 15) as i32;
    let scale = 10f64.powi(precision);
    Ok(Value::Real((x * scale).round() / scale))
}

/// Integer result when both operands are integers, the exponent is not
/// negative and nothing overflows.
pub(super) fn pow(ctx: &mut CallContext<'_>, args: &[Value]) -> VmResult<Value> {
    expect_args(ctx, args, 2)?;
    let (base, exp) = (args[0].to_number(), args[1].to_number());
    if let (Number::Int(b), Number::Int(e)) = (base, exp) {
        if let Some(result) = u32::try_from(e).ok().and_then(|e| b.checked_pow(e)) {
            return Ok(Value::Int(result));
        }
    }
    Ok(Value::Real(base.as_f64().powf(exp.as_f64())))
}

#[cfg(test)]
mod tests {
    use super::super::tests::call;
    use quarry_codec::{ArrayMap, Value};

    fn run(name: &str, args: &[Value]) -> Value {
        call(name, args).unwrap().0
    }

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().map(|&i| Value::Int(i)))
    }

    fn object(pairs: &[(&str, i64)]) -> Value {
        let mut map = ArrayMap::new();
        for (k, v) in pairs {
            map.insert((*k).into(), Value::Int(*v));
        }
        Value::array(map)
    }

    #[test]
    fn counting_and_keys() {
        assert_eq!(run("count", &[ints(&[1, 2, 3])]), Value::Int(3));
        assert_eq!(run("count", &[Value::Null]), Value::Int(0));
        assert_eq!(run("count", &[Value::str("x")]), Value::Int(1));

        let obj = object(&[("a", 1), ("b", 2)]);
        assert_eq!(
            run("array_keys", &[obj.clone()]),
            Value::list([Value::str("a"), Value::str("b")])
        );
        assert_eq!(run("array_values", &[obj]), ints(&[1, 2]));
        assert!(call("array_keys", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn merge_renumbers_and_overwrites() {
        let merged = run(
            "array_merge",
            &[
                ints(&[1, 2]),
                object(&[("a", 1)]),
                ints(&[3]),
                object(&[("a", 9)]),
            ],
        );
        let map = merged.as_array().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&2.into()), Some(&Value::Int(3)));
        assert_eq!(map.get_str("a"), Some(&Value::Int(9)));
    }

    #[test]
    fn membership() {
        let list = Value::list([Value::str("1"), Value::Int(2)]);
        assert_eq!(run("in_array", &[Value::Int(1), list.clone()]), Value::Bool(true));
        assert_eq!(
            run("in_array", &[Value::Int(1), list.clone(), Value::Bool(true)]),
            Value::Bool(false)
        );
        assert_eq!(run("array_key_exists", &[Value::str("1"), list]), Value::Bool(true));
    }

    #[test]
    fn ranges() {
        assert_eq!(run("range", &[Value::Int(1), Value::Int(4)]), ints(&[1, 2, 3, 4]));
        assert_eq!(
            run("range", &[Value::Int(5), Value::Int(0), Value::Int(-2)]),
            ints(&[5, 3, 1])
        );
        assert_eq!(
            run("range", &[Value::Int(0), Value::Int(1), Value::Real(0.5)]),
            Value::list([Value::Real(0.0), Value::Real(0.5), Value::Real(1.0)])
        );
        assert!(call("range", &[Value::Int(0), Value::Int(3), Value::Int(0)]).is_err());
        let err = call("range", &[Value::Int(i64::MIN), Value::Int(i64::MAX)]).unwrap_err();
        assert_eq!(err.message(), "range(): range is too large");
        assert!(call("range", &[Value::Int(i64::MAX), Value::Int(i64::MIN), Value::Int(-1)]).is_err());
        assert!(call("range", &[Value::Int(0), Value::Int(1 << 24)]).is_err());
    }

    #[test]
    fn reverse() {
        assert_eq!(run("array_reverse", &[ints(&[1, 2, 3])]), ints(&[3, 2, 1]));
        let kept = run("array_reverse", &[ints(&[1, 2]), Value::Bool(true)]);
        let map = kept.as_array().unwrap();
        assert_eq!(map.entry_at(0).map(|(k, _)| k.clone()), Some(1.into()));
    }

    #[test]
    fn math() {
        assert_eq!(run("abs", &[Value::Int(-4)]), Value::Int(4));
        assert_eq!(run("min", &[Value::Int(3), Value::str("2"), Value::Int(5)]), Value::str("2"));
        assert_eq!(run("max", &[ints(&[3, 9, 1])]), Value::Int(9));
        assert!(call("max", &[]).is_err());
        assert_eq!(run("floor", &[Value::Real(2.7)]), Value::Real(2.0));
        assert_eq!(run("ceil", &[Value::Int(2)]), Value::Real(2.0));
        assert_eq!(run("round", &[Value::Real(2.5)]), Value::Real(3.0));
        assert_eq!(run("round", &[Value::Real(1.2345), Value::Int(2)]), Value::Real(1.23));
        assert_eq!(run("sqrt", &[Value::Int(16)]), Value::Real(4.0));
        assert_eq!(run("pow", &[Value::Int(2), Value::Int(10)]), Value::Int(1024));
        assert_eq!(run("pow", &[Value::Int(2), Value::Int(-1)]), Value::Real(0.5));
    }
}
