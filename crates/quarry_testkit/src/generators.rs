//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, values, documents and
//! operation sequences, plus an in-memory model to check results against.

use proptest::prelude::*;
use quarry_codec::{ArrayKey, ArrayMap, Value};
use quarry_core::{CoreResult, Database};
use std::collections::BTreeMap;

/// Strategy for keys: short, non-empty, drawn from a small alphabet so
/// that operation sequences revisit the same keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"abcdefgh".to_vec()), 1..6)
}

/// Strategy for values: arbitrary bytes, occasionally large enough to need
/// overflow pages at small page sizes.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..64),
        1 => prop::collection::vec(any::<u8>(), 512..3000),
    ]
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for scalar document fields.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9f64..1.0e9).prop_map(Value::Real),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ]
}

/// Strategy for documents: string-keyed arrays nesting up to two levels.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    let field = scalar_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::list),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(object),
        ]
    });
    prop::collection::btree_map("[a-z]{1,8}", field, 0..6).prop_map(object)
}

fn object(fields: BTreeMap<String, Value>) -> Value {
    fields
        .into_iter()
        .map(|(k, v)| (ArrayKey::from(k.as_str()), v))
        .collect::<ArrayMap>()
        .into()
}

/// One key/value operation.
#[derive(Debug, Clone)]
pub enum KvOperation {
    /// Store a value
    Store {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Append to a value
    Append {
        /// Key
        key: Vec<u8>,
        /// Bytes to append
        value: Vec<u8>,
    },
    /// Delete a key
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Fetch a key
    Fetch {
        /// Key
        key: Vec<u8>,
    },
}

/// Strategy for generating a single operation.
pub fn operation_strategy() -> impl Strategy<Value = KvOperation> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| KvOperation::Store { key, value }),
        1 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| KvOperation::Append { key, value }),
        2 => key_strategy().prop_map(|key| KvOperation::Delete { key }),
        2 => key_strategy().prop_map(|key| KvOperation::Fetch { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    max_len: usize,
) -> impl Strategy<Value = Vec<KvOperation>> {
    prop::collection::vec(operation_strategy(), 1..=max_len)
}

/// Reference model of the key/value engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvModel {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an operation; returns what a fetch would see, if it was one.
    pub fn apply(&mut self, op: &KvOperation) -> Option<Vec<u8>> {
        match op {
            KvOperation::Store { key, value } => {
                self.records.insert(key.clone(), value.clone());
                None
            }
            KvOperation::Append { key, value } => {
                self.records
                    .entry(key.clone())
                    .or_default()
                    .extend_from_slice(value);
                None
            }
            KvOperation::Delete { key } => {
                self.records.remove(key);
                None
            }
            KvOperation::Fetch { key } => self.records.get(key).cloned(),
        }
    }

    /// Records in key order.
    pub fn records(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.records
    }
}

/// Applies an operation to a database; returns the fetched value for
/// `Fetch`, `None` otherwise.
///
/// # Errors
///
/// Whatever the engine reports.
pub fn apply_to_database(db: &Database, op: &KvOperation) -> CoreResult<Option<Vec<u8>>> {
    match op {
        KvOperation::Store { key, value } => db.store(key, value).map(|()| None),
        KvOperation::Append { key, value } => db.append(key, value).map(|()| None),
        KvOperation::Delete { key } => db.delete(key).map(|_| None),
        KvOperation::Fetch { key } => db.fetch(key),
    }
}

/// Reads every record through a cursor.
///
/// # Errors
///
/// Whatever the engine reports.
pub fn dump(db: &Database) -> CoreResult<BTreeMap<Vec<u8>, Vec<u8>>> {
    db.cursor()?.into_iter().collect()
}
