//! Collection handle.

use super::keys::{meta_key, record_id, record_key, record_prefix, validate_name};
use crate::btree::{self, WriteMode};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::pager::Pager;
use quarry_codec::{from_document, to_document, ArrayKey, ArrayMap, Value};

/// Field every stored document carries with its id.
const ID_FIELD: &str = "__id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Meta {
    next_id: u64,
    count: u64,
}

impl Meta {
    fn encode(self) -> CoreResult<Vec<u8>> {
        let mut map = ArrayMap::new();
        map.insert("next_id".into(), Value::Int(self.next_id as i64));
        map.insert("count".into(), Value::Int(self.count as i64));
        Ok(to_document(&Value::array(map))?)
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let value = from_document(bytes)?;
        let map = value
            .as_array()
            .ok_or_else(|| CoreError::corrupt("collection metadata is not a document"))?;
        let field = |name: &str| match map.get_str(name) {
            Some(Value::Int(n)) if *n >= 0 => Ok(*n as u64),
            _ => Err(CoreError::corrupt(format!("collection metadata lacks {name}"))),
        };
        Ok(Self {
            next_id: field("next_id")?,
            count: field("count")?,
        })
    }
}

/// A named collection of documents.
///
/// Obtained from [`Database::collection`]. The handle is cheap; every call
/// goes to the store, and writes follow the database's transaction rules
/// like any other write.
///
/// ```rust
/// use quarry_codec::{ArrayMap, Value};
/// use quarry_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// let users = db.collection("users").unwrap();
/// users.create().unwrap();
///
/// let mut doc = ArrayMap::new();
/// doc.insert("name".into(), Value::str("Juan"));
/// let id = users.store(&Value::array(doc)).unwrap();
///
/// let stored = users.fetch_by_id(id).unwrap().unwrap();
/// assert_eq!(stored.as_array().unwrap().get_str("__id"), Some(&Value::Int(0)));
/// ```
#[derive(Debug, Clone)]
pub struct Collection<'db> {
    db: &'db Database,
    name: String,
    meta: Vec<u8>,
    prefix: Vec<u8>,
}

impl<'db> Collection<'db> {
    pub(crate) fn new(db: &'db Database, name: &str) -> CoreResult<Self> {
        let page_size = db.read_op(|pager| Ok(pager.page_size()))?;
        validate_name(name, page_size)?;
        Ok(Self {
            db,
            name: name.to_string(),
            meta: meta_key(name),
            prefix: record_prefix(name),
        })
    }

    /// Name of the collection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the collection. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// A storage error, or `ReadOnly`.
    pub fn create(&self) -> CoreResult<bool> {
        let meta = Meta::default().encode()?;
        self.db.write_op(|pager| {
            if btree::contains(pager, &self.meta)? {
                return Ok(false);
            }
            btree::put(pager, &self.meta, &meta, WriteMode::Store)?;
            Ok(true)
        })
    }

    /// Returns `true` if the collection exists.
    ///
    /// # Errors
    ///
    /// A storage error.
    pub fn exists(&self) -> CoreResult<bool> {
        self.db.read_op(|pager| btree::contains(pager, &self.meta))
    }

    /// Removes the collection and every document in it. Returns `false` if
    /// it did not exist.
    ///
    /// # Errors
    ///
    /// A storage error, or `ReadOnly`.
    pub fn drop(&self) -> CoreResult<bool> {
        self.db.write_op(|pager| {
            if !btree::contains(pager, &self.meta)? {
                return Ok(false);
            }
            let mut keys = Vec::new();
            scan(pager, &self.prefix, &self.prefix, |key, _| {
                keys.push(key.to_vec());
                Ok(true)
            })?;
            for key in &keys {
                btree::remove(pager, key)?;
            }
            btree::remove(pager, &self.meta)?;
            Ok(true)
        })
    }

    /// Stores a document and returns its id.
    ///
    /// A list whose elements are all documents stores each of them and
    /// returns the id of the last one.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `value` is not an array or cannot be encoded
    /// - `CollectionNotFound` if the collection does not exist
    pub fn store(&self, value: &Value) -> CoreResult<u64> {
        let docs = split_batch(value)?;
        let count = docs.len() as u64;
        self.db.write_op(|pager| {
            let mut meta = self.load_meta(pager)?;
            // encode everything before the first write
            let first = meta.next_id;
            let encoded = docs
                .iter()
                .zip(first..)
                .map(|(doc, id)| Ok((id, encode_document(doc, id)?)))
                .collect::<CoreResult<Vec<_>>>()?;
            for (id, bytes) in &encoded {
                btree::put(pager, &record_key(&self.name, *id), bytes, WriteMode::Store)?;
            }
            meta.next_id += count;
            meta.count += count;
            btree::put(pager, &self.meta, &meta.encode()?, WriteMode::Store)?;
            Ok(meta.next_id - 1)
        })
    }

    /// Reads one document.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound`, or `Corrupt` for an undecodable record.
    pub fn fetch_by_id(&self, id: u64) -> CoreResult<Option<Value>> {
        self.db.read_op(|pager| {
            self.load_meta(pager)?;
            btree::get(pager, &record_key(&self.name, id))?
                .map(|bytes| from_document(&bytes).map_err(CoreError::from))
                .transpose()
        })
    }

    /// Reads every document in id order.
    ///
    /// # Errors
    ///
    /// As for [`Collection::fetch_by_id`].
    pub fn fetch_all(&self) -> CoreResult<Vec<Value>> {
        self.db.read_op(|pager| {
            self.load_meta(pager)?;
            let mut docs = Vec::new();
            scan(pager, &self.prefix, &self.prefix, |_, bytes| {
                docs.push(from_document(bytes)?);
                Ok(true)
            })?;
            Ok(docs)
        })
    }

    /// The first document with an id above `after`, or the first document
    /// when `after` is `None`.
    ///
    /// # Errors
    ///
    /// As for [`Collection::fetch_by_id`].
    pub fn fetch_next(&self, after: Option<u64>) -> CoreResult<Option<(u64, Value)>> {
        let start = match after {
            Some(u64::MAX) => return Ok(None),
            Some(id) => record_key(&self.name, id + 1),
            None => self.prefix.clone(),
        };
        self.db.read_op(|pager| {
            self.load_meta(pager)?;
            let mut found = None;
            scan(pager, &start, &self.prefix, |key, bytes| {
                found = Some((record_id(&self.prefix, key)?, from_document(bytes)?));
                Ok(false)
            })?;
            Ok(found)
        })
    }

    /// Replaces a stored document. Returns `false` if no document has `id`.
    ///
    /// # Errors
    ///
    /// As for [`Collection::store`].
    pub fn update_record(&self, id: u64, value: &Value) -> CoreResult<bool> {
        let Some(doc) = value.as_array() else {
            return Err(CoreError::invalid_argument(format!(
                "documents must be arrays, got {}",
                value.type_name()
            )));
        };
        let bytes = encode_document(doc, id)?;
        let key = record_key(&self.name, id);
        self.db.write_op(|pager| {
            self.load_meta(pager)?;
            if !btree::contains(pager, &key)? {
                return Ok(false);
            }
            btree::put(pager, &key, &bytes, WriteMode::Store)?;
            Ok(true)
        })
    }

    /// Deletes one document. Returns `false` if no document has `id`.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound`, a storage error, or `ReadOnly`.
    pub fn drop_record(&self, id: u64) -> CoreResult<bool> {
        let key = record_key(&self.name, id);
        self.db.write_op(|pager| {
            let mut meta = self.load_meta(pager)?;
            if !btree::remove(pager, &key)? {
                return Ok(false);
            }
            meta.count = meta.count.saturating_sub(1);
            btree::put(pager, &self.meta, &meta.encode()?, WriteMode::Store)?;
            Ok(true)
        })
    }

    /// Number of documents.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` or a storage error.
    pub fn total_records(&self) -> CoreResult<u64> {
        self.db.read_op(|pager| Ok(self.load_meta(pager)?.count))
    }

    /// Id of the most recently stored document; `None` before the first.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` or a storage error.
    pub fn last_record_id(&self) -> CoreResult<Option<u64>> {
        self.db
            .read_op(|pager| Ok(self.load_meta(pager)?.next_id.checked_sub(1)))
    }

    fn load_meta(&self, pager: &mut Pager) -> CoreResult<Meta> {
        match btree::get(pager, &self.meta)? {
            Some(bytes) => Meta::decode(&bytes),
            None => Err(CoreError::CollectionNotFound {
                name: self.name.clone(),
            }),
        }
    }
}

/// Splits a store request into the documents to write.
fn split_batch(value: &Value) -> CoreResult<Vec<&ArrayMap>> {
    let Some(map) = value.as_array() else {
        return Err(CoreError::invalid_argument(format!(
            "documents must be arrays, got {}",
            value.type_name()
        )));
    };
    let batch: Option<Vec<&ArrayMap>> = if map.is_list() && !map.is_empty() {
        map.values().map(Value::as_array).collect()
    } else {
        None
    };
    Ok(batch.unwrap_or_else(|| vec![map]))
}

fn encode_document(doc: &ArrayMap, id: u64) -> CoreResult<Vec<u8>> {
    let mut map = doc.clone();
    map.insert(ArrayKey::from(ID_FIELD), Value::Int(id as i64));
    to_document(&Value::array(map))
        .map_err(|e| CoreError::invalid_argument(format!("cannot encode document: {e}")))
}

/// Visits records whose keys start with `prefix`, from `start` on, until
/// `visit` returns `false`.
fn scan(
    pager: &mut Pager,
    start: &[u8],
    prefix: &[u8],
    mut visit: impl FnMut(&[u8], &[u8]) -> CoreResult<bool>,
) -> CoreResult<()> {
    let Some(mut leaf) = btree::find_leaf(pager, start)? else {
        return Ok(());
    };
    let mut slot = match leaf.search(start) {
        Ok(slot) | Err(slot) => slot,
    };
    for _ in 0..=pager.page_count() {
        while let Some(cell) = leaf.cells.get(slot) {
            if !cell.key.starts_with(prefix) {
                return Ok(());
            }
            let value = btree::read_value(pager, &cell.value)?;
            if !visit(&cell.key, &value)? {
                return Ok(());
            }
            slot += 1;
        }
        if leaf.next.is_none() {
            return Ok(());
        }
        leaf = btree::load_leaf(pager, leaf.next)?;
        slot = 0;
    }
    Err(CoreError::corrupt("leaf chain loops"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn doc(name: &str, age: i64) -> Value {
        let mut map = ArrayMap::new();
        map.insert("name".into(), Value::str(name));
        map.insert("age".into(), Value::Int(age));
        Value::array(map)
    }

    fn field<'v>(value: &'v Value, name: &str) -> &'v Value {
        value.as_array().unwrap().get_str(name).unwrap()
    }

    #[test]
    fn collection_keys_share_the_record_space() {
        let db = Database::open_in_memory().unwrap();
        db.store(b"plain", b"1").unwrap();
        let users = db.collection("users").unwrap();
        users.create().unwrap();
        users.store(&doc("ann", 31)).unwrap();

        let keys: Vec<Vec<u8>> = db
            .cursor()
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(db.record_count().unwrap(), keys.len() as u64);
        let (reserved, plain): (Vec<_>, Vec<_>) =
            keys.into_iter().partition(|k| crate::is_reserved_key(k));
        assert_eq!(plain, vec![b"plain".to_vec()]);
        assert_eq!(reserved, vec![meta_key("users"), record_key("users", 0)]);
    }

    #[test]
    fn lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let users = db.collection("users").unwrap();
        assert!(!users.exists().unwrap());
        assert!(users.create().unwrap());
        assert!(!users.create().unwrap());
        assert!(users.exists().unwrap());

        assert_eq!(users.last_record_id().unwrap(), None);
        assert_eq!(users.store(&doc("Juan", 30)).unwrap(), 0);
        assert_eq!(users.store(&doc("Ana", 25)).unwrap(), 1);
        assert_eq!(users.total_records().unwrap(), 2);
        assert_eq!(users.last_record_id().unwrap(), Some(1));

        let ana = users.fetch_by_id(1).unwrap().unwrap();
        assert_eq!(field(&ana, "name"), &Value::str("Ana"));
        assert_eq!(field(&ana, "__id"), &Value::Int(1));
        assert!(users.fetch_by_id(9).unwrap().is_none());

        assert!(users.drop().unwrap());
        assert!(!users.exists().unwrap());
        assert!(!users.drop().unwrap());
        assert_eq!(db.record_count().unwrap(), 0);
    }

    #[test]
    fn batch_store_and_scan() {
        let db = Database::open_in_memory().unwrap();
        let people = db.collection("people").unwrap();
        people.create().unwrap();
        let batch = Value::list(vec![doc("a", 1), doc("b", 2), doc("c", 3)]);
        assert_eq!(people.store(&batch).unwrap(), 2);

        let all = people.fetch_all().unwrap();
        let names: Vec<_> = all.iter().map(|d| field(d, "name").clone()).collect();
        assert_eq!(names, vec![Value::str("a"), Value::str("b"), Value::str("c")]);

        let (id, first) = people.fetch_next(None).unwrap().unwrap();
        assert_eq!((id, field(&first, "name")), (0, &Value::str("a")));
        let (id, _) = people.fetch_next(Some(id)).unwrap().unwrap();
        assert_eq!(id, 1);
        assert!(people.fetch_next(Some(2)).unwrap().is_none());
    }

    #[test]
    fn update_and_drop_records() {
        let db = Database::open_in_memory().unwrap();
        let items = db.collection("items").unwrap();
        items.create().unwrap();
        items.store(&doc("old", 1)).unwrap();

        assert!(items.update_record(0, &doc("new", 2)).unwrap());
        assert!(!items.update_record(5, &doc("x", 0)).unwrap());
        let updated = items.fetch_by_id(0).unwrap().unwrap();
        assert_eq!(field(&updated, "name"), &Value::str("new"));
        assert_eq!(field(&updated, "__id"), &Value::Int(0));

        assert!(items.drop_record(0).unwrap());
        assert!(!items.drop_record(0).unwrap());
        assert_eq!(items.total_records().unwrap(), 0);
        // ids are never reused
        assert_eq!(items.store(&doc("next", 3)).unwrap(), 1);
    }

    #[test]
    fn collections_do_not_overlap() {
        let db = Database::open_in_memory().unwrap();
        let a = db.collection("a").unwrap();
        let ab = db.collection("ab").unwrap();
        a.create().unwrap();
        ab.create().unwrap();
        a.store(&doc("in a", 0)).unwrap();
        ab.store(&doc("in ab", 0)).unwrap();
        assert_eq!(a.fetch_all().unwrap().len(), 1);
        assert_eq!(ab.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn errors() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.collection("").is_err());
        let missing = db.collection("missing").unwrap();
        let err = missing.store(&doc("x", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(missing.total_records().unwrap_err().kind(), ErrorKind::NotFound);

        let c = db.collection("c").unwrap();
        c.create().unwrap();
        let err = c.store(&Value::Int(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn store_inside_rolled_back_transaction() {
        let db = Database::open_in_memory().unwrap();
        let c = db.collection("c").unwrap();
        c.create().unwrap();
        db.begin().unwrap();
        c.store(&doc("temp", 1)).unwrap();
        // a caller error keeps the transaction
        assert!(c.store(&Value::Null).is_err());
        db.rollback().unwrap();
        assert_eq!(c.total_records().unwrap(), 0);
    }
}
