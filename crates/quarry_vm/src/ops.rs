//! Operator semantics.

use crate::ast::{BinOp, UnOp};
use crate::error::{VmError, VmResult};
use bytes::BytesMut;
use quarry_codec::{compare, loose_eq, strict_eq, ArrayKey, Number, Value};
use std::cmp::Ordering;

/// Applies a binary operator.
pub(crate) fn binary(op: BinOp, a: &Value, b: &Value) -> VmResult<Value> {
    let value = match op {
        BinOp::Add => {
            if let (Value::Array(x), Value::Array(y)) = (a, b) {
                let mut union = (**x).clone();
                for (key, value) in y.iter() {
                    if !union.contains_key(key) {
                        union.insert(key.clone(), value.clone());
                    }
                }
                Value::array(union)
            } else {
                arith(a.to_number(), b.to_number(), i64::checked_add, |x, y| x + y)
            }
        }
        BinOp::Sub => arith(a.to_number(), b.to_number(), i64::checked_sub, |x, y| x - y),
        BinOp::Mul => arith(a.to_number(), b.to_number(), i64::checked_mul, |x, y| x * y),
        BinOp::Div => divide(a.to_number(), b.to_number())?,
        BinOp::Mod => {
            let divisor = b.to_int();
            if divisor == 0 {
                return Err(VmError::runtime("modulo by zero"));
            }
            Value::Int(a.to_int().checked_rem(divisor).unwrap_or(0))
        }
        BinOp::Concat => concat(a, b),
        BinOp::Eq => Value::Bool(loose_eq(a, b)),
        BinOp::Ne => Value::Bool(!loose_eq(a, b)),
        BinOp::Identical => Value::Bool(strict_eq(a, b)),
        BinOp::NotIdentical => Value::Bool(!strict_eq(a, b)),
        BinOp::Lt => Value::Bool(ordered(a, b) == Some(Ordering::Less)),
        BinOp::Le => Value::Bool(matches!(
            ordered(a, b),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinOp::Gt => Value::Bool(ordered(a, b) == Some(Ordering::Greater)),
        BinOp::Ge => Value::Bool(matches!(
            ordered(a, b),
            Some(Ordering::Greater | Ordering::Equal)
        )),
    };
    Ok(value)
}

/// Loose ordering; `None` when either side is NaN.
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    let nan = |v: &Value| matches!(v, Value::Real(r) if r.is_nan());
    if nan(a) || nan(b) {
        return None;
    }
    Some(compare(a, b, false))
}

fn arith(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
) -> Value {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if let Some(result) = int_op(x, y) {
            return Value::Int(result);
        }
    }
    Value::Real(real_op(a.as_f64(), b.as_f64()))
}

fn divide(a: Number, b: Number) -> VmResult<Value> {
    if b.as_f64() == 0.0 {
        return Err(VmError::runtime("division by zero"));
    }
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        if x.checked_rem(y) == Some(0) {
            if let Some(q) = x.checked_div(y) {
                return Ok(Value::Int(q));
            }
        }
    }
    Ok(Value::Real(a.as_f64() / b.as_f64()))
}

/// String concatenation of the printed forms.
pub(crate) fn concat(a: &Value, b: &Value) -> Value {
    let (x, y) = (a.to_bytes(), b.to_bytes());
    if x.is_empty() {
        return Value::String(y);
    }
    let mut out = BytesMut::with_capacity(x.len() + y.len());
    out.extend_from_slice(&x);
    out.extend_from_slice(&y);
    Value::String(out.freeze())
}

pub(crate) fn unary(op: UnOp, v: &Value) -> Value {
    match op {
        UnOp::Not => Value::Bool(!v.to_bool()),
        UnOp::Plus => v.to_number().into_value(),
        UnOp::Neg => match v.to_number() {
            Number::Int(i) => i
                .checked_neg()
                .map_or(Value::Real(-(i as f64)), Value::Int),
            Number::Real(r) => Value::Real(-r),
        },
    }
}

/// Result of `++`/`--`. Null increments to 1 and decrements to null.
pub(crate) fn step(v: &Value, delta: i8) -> Value {
    match (v, delta > 0) {
        (Value::Null, true) => Value::Int(1),
        (Value::Null, false) => Value::Null,
        _ => arith(
            v.to_number(),
            Number::Int(i64::from(delta)),
            i64::checked_add,
            |x, y| x + y,
        ),
    }
}

/// `$base[$key]`. Strings index single bytes; anything else reads as null.
pub(crate) fn index(base: &Value, key: &Value) -> Value {
    match base {
        Value::Array(map) => map
            .get(&ArrayKey::from_value(key))
            .cloned()
            .unwrap_or_default(),
        Value::String(s) => {
            let len = s.len() as i64;
            let mut at = key.to_int();
            if at < 0 {
                at += len;
            }
            if (0..len).contains(&at) {
                let at = at as usize;
                Value::String(s.slice(at..=at))
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}
