//! JSON conversion for script values.
//!
//! Backs the `json_encode`/`json_decode` built-ins and the printed form of
//! arrays. Lists become JSON arrays, every other array becomes an object whose
//! keys are the stringified array keys. Non-UTF-8 strings are converted lossily.

use crate::error::{CodecError, CodecResult};
use crate::value::{ArrayKey, ArrayMap, Value};
use serde_json::{Map, Number as JsonNumber, Value as Json};

/// Converts a value into a `serde_json` tree.
///
/// Resources and non-finite floats become JSON `null`.
#[must_use]
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null | Value::Resource(_) => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number(JsonNumber::from(*i)),
        Value::Real(r) => JsonNumber::from_f64(*r).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(String::from_utf8_lossy(s).into_owned()),
        Value::Array(map) if map.is_list() => Json::Array(map.values().map(to_json).collect()),
        Value::Array(map) => {
            let mut object = Map::with_capacity(map.len());
            for (key, item) in map.iter() {
                object.insert(key.to_string(), to_json(item));
            }
            Json::Object(object)
        }
    }
}

/// Converts a `serde_json` tree into a value. Object key order is preserved.
#[must_use]
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Real(n.as_f64().unwrap_or(0.0)),
        },
        Json::String(s) => Value::str(s),
        Json::Array(items) => Value::list(items.iter().map(from_json)),
        Json::Object(object) => Value::array(
            object
                .iter()
                .map(|(k, v)| (ArrayKey::from(k.as_str()), from_json(v)))
                .collect::<ArrayMap>(),
        ),
    }
}

/// Encodes a value as compact JSON text.
#[must_use]
pub fn to_json_string(value: &Value) -> String {
    to_json(value).to_string()
}

/// Encodes a value as indented JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_pretty(value: &Value) -> CodecResult<String> {
    serde_json::to_string_pretty(&to_json(value))
        .map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Parses JSON text into a value.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if the text is not valid JSON.
pub fn from_json_str(text: &str) -> CodecResult<Value> {
    let json: Json = serde_json::from_str(text).map_err(|e| CodecError::InvalidJson {
        message: e.to_string(),
    })?;
    Ok(from_json(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_encodes_as_json_array() {
        let v = Value::list([Value::Int(1), Value::Real(2.5), Value::Null]);
        assert_eq!(to_json_string(&v), "[1,2.5,null]");
    }

    #[test]
    fn map_encodes_as_object_in_insertion_order() {
        let mut map = ArrayMap::new();
        map.insert("name".into(), Value::str("Juan"));
        map.insert("age".into(), Value::Int(30));
        assert_eq!(
            to_json_string(&Value::array(map)),
            r#"{"name":"Juan","age":30}"#
        );
    }

    #[test]
    fn sparse_list_encodes_as_object() {
        let mut map = ArrayMap::new();
        map.insert(ArrayKey::Int(1), Value::Bool(true));
        assert_eq!(to_json_string(&Value::array(map)), r#"{"1":true}"#);
    }

    #[test]
    fn decode_preserves_key_order_and_types() {
        let v = from_json_str(r#"{"z":1,"a":[true,"x"],"f":1.5}"#).unwrap();
        let map = v.as_array().unwrap();
        let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["z", "a", "f"]);
        assert_eq!(map.get_str("f"), Some(&Value::Real(1.5)));
        assert_eq!(
            map.get_str("a"),
            Some(&Value::list([Value::Bool(true), Value::str("x")]))
        );
    }

    #[test]
    fn decode_invalid_json_fails() {
        assert!(matches!(
            from_json_str("{oops"),
            Err(CodecError::InvalidJson { .. })
        ));
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(to_json_string(&Value::Real(f64::INFINITY)), "null");
    }
}
