//! Document collections.
//!
//! A collection is a named sequence of documents (script values that are
//! arrays) kept in the key/value store under reserved keys. Each stored
//! document receives a numeric id, also written into the document as
//! `__id`.
//!
//! # Key layout
//!
//! ```text
//! 0x00 "col:" name                  collection metadata {next_id, count}
//! 0x00 "col:" name 0x00 id(u64 BE)  one document
//! ```
//!
//! Big-endian ids keep a collection's documents in id order, so a prefix scan
//! returns them oldest first.
//!
//! These keys share the one key space with raw key/value records: a cursor
//! visits them (they sort before every key not starting with `0x00`) and
//! [`Database::record_count`](crate::Database::record_count) counts them.
//! Use [`is_reserved_key`] to tell them apart.

mod handle;
mod keys;

pub use handle::Collection;
pub use keys::{is_reserved_key, RESERVED_PREFIX};
