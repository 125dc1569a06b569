//! Reserved key encoding for collections.

use crate::btree::max_key_len;
use crate::error::{CoreError, CoreResult};

/// First byte of every key the engine reserves for itself.
pub const RESERVED_PREFIX: u8 = 0x00;

const META_TAG: &[u8] = b"col:";
const ID_LEN: usize = 8;

/// Returns `true` if `key` lies in the reserved key space.
#[must_use]
pub fn is_reserved_key(key: &[u8]) -> bool {
    key.first() == Some(&RESERVED_PREFIX)
}

/// Key of the collection's metadata record.
pub(crate) fn meta_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + META_TAG.len() + name.len());
    key.push(RESERVED_PREFIX);
    key.extend_from_slice(META_TAG);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Prefix shared by every document key of the collection.
pub(crate) fn record_prefix(name: &str) -> Vec<u8> {
    let mut key = meta_key(name);
    key.push(0);
    key
}

/// Key of one document.
pub(crate) fn record_key(name: &str, id: u64) -> Vec<u8> {
    let mut key = record_prefix(name);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Recovers the id from a document key.
pub(crate) fn record_id(prefix: &[u8], key: &[u8]) -> CoreResult<u64> {
    key.strip_prefix(prefix)
        .and_then(|rest| <[u8; ID_LEN]>::try_from(rest).ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| CoreError::corrupt("malformed collection record key"))
}

/// Checks that `name` can be used as a collection name.
pub(crate) fn validate_name(name: &str, page_size: usize) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_argument("collection name must not be empty"));
    }
    if name.bytes().any(|b| b == 0) {
        return Err(CoreError::invalid_argument("collection name must not contain NUL"));
    }
    let longest = record_prefix(name).len() + ID_LEN;
    if longest > max_key_len(page_size) {
        return Err(CoreError::invalid_argument(format!(
            "collection name of {} bytes is too long for {page_size}-byte pages",
            name.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_id() {
        let a = record_key("users", 2);
        let b = record_key("users", 10);
        assert!(a < b);
        assert!(meta_key("users") < a);
        assert!(a.starts_with(&record_prefix("users")));
        assert!(!record_key("users2", 0).starts_with(&record_prefix("users")));
        assert!(is_reserved_key(&a));
        assert!(!is_reserved_key(b"users"));
    }

    #[test]
    fn id_round_trips_through_key() {
        let prefix = record_prefix("c");
        assert_eq!(record_id(&prefix, &record_key("c", 77)).unwrap(), 77);
        assert!(record_id(&prefix, &meta_key("c")).is_err());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("users", 4096).is_ok());
        assert!(validate_name("", 4096).is_err());
        assert!(validate_name("a\0b", 4096).is_err());
        assert!(validate_name(&"x".repeat(200), 512).is_err());
    }
}
