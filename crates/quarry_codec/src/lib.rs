//! # QuarryDB Codec
//!
//! The dynamic value model shared by the scripting VM and the document
//! store, plus its two serialized forms.
//!
//! - [`Value`] is a closed sum type (null, bool, int, float, byte string,
//!   ordered array, resource). [`ArrayMap`] backs arrays and serves as both a
//!   list and a map.
//! - [`compare`], [`loose_eq`] and [`strict_eq`] implement script comparison
//!   semantics, with numeric coercion of numeric-looking strings in loose mode.
//! - [`to_document`]/[`from_document`] are the binary document format used
//!   for stored records: a deterministic CBOR subset that keeps insertion order.
//! - [`to_json_string`]/[`from_json_str`] convert to and from JSON text.
//!
//! ## Usage
//!
//! ```
//! use quarry_codec::{from_document, to_document, ArrayMap, Value};
//!
//! let mut doc = ArrayMap::new();
//! doc.insert("name".into(), Value::str("Juan"));
//! doc.insert("age".into(), Value::Int(30));
//! let value = Value::array(doc);
//!
//! let bytes = to_document(&value).unwrap();
//! assert_eq!(from_document(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_document, DocumentDecoder};
pub use encoder::{to_document, DocumentEncoder, MAX_DEPTH};
pub use error::{CodecError, CodecResult};
pub use json::{from_json, from_json_str, to_json, to_json_pretty, to_json_string};
pub use value::{
    compare, format_real, loose_eq, parse_numeric, strict_eq, ArrayKey, ArrayMap, Number, Value,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e12f64..1.0e12).prop_map(Value::Real),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::from),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::list),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(|pairs| {
                    Value::array(
                        pairs
                            .into_iter()
                            .map(|(k, v)| (ArrayKey::from(k.as_str()), v))
                            .collect(),
                    )
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn document_encoding_is_lossless(value in arb_value()) {
            let bytes = to_document(&value).unwrap();
            prop_assert_eq!(from_document(&bytes).unwrap(), value);
        }

        #[test]
        fn document_encoding_is_deterministic(value in arb_value()) {
            prop_assert_eq!(to_document(&value).unwrap(), to_document(&value.clone()).unwrap());
        }

        #[test]
        fn loose_comparison_is_reflexive(value in arb_value()) {
            prop_assert!(loose_eq(&value, &value));
            prop_assert!(strict_eq(&value, &value));
        }
    }
}
