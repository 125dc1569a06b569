//! # QuarryDB Core
//!
//! Embedded single-file key/value engine.
//!
//! This crate provides:
//! - a pager over a [`quarry_storage::StorageBackend`] with checksummed
//!   pages, an LRU page cache and a trunk-based free list
//! - a rollback journal that makes every transaction atomic and lets a
//!   crashed store recover its last committed state on open
//! - a B+tree mapping byte-string keys to byte-string values, with overflow
//!   chains for large values
//! - single-writer transactions, auto-commit and ordered cursors
//! - document collections stored as encoded [`quarry_codec::Value`]s
//!
//! Collections keep their documents under keys starting with
//! [`RESERVED_PREFIX`] in the same key space as raw records, so cursors and
//! [`Database::record_count`] include them; [`is_reserved_key`] identifies
//! them.
//!
//! ## Quick start
//!
//! ```rust
//! use quarry_core::{Database, SeekMode};
//!
//! let db = Database::open_in_memory().unwrap();
//! db.store(b"nombre", b"Juan").unwrap();
//! db.store(b"edad", b"30").unwrap();
//!
//! let mut cursor = db.cursor().unwrap();
//! assert!(cursor.seek(b"f", SeekMode::GreaterOrEqual).unwrap());
//! assert_eq!(cursor.key().unwrap(), b"nombre");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod btree;
mod collection;
mod config;
mod cursor;
mod database;
mod error;
mod flags;
pub mod journal;
mod lock;
pub mod pager;
mod stats;
mod transaction;
mod types;

pub use collection::{is_reserved_key, Collection, RESERVED_PREFIX};
pub use config::{
    is_valid_page_size, Config, ConfigPayload, ConfigRequest, ThreadingMode, DEFAULT_ENGINE,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
pub use cursor::{Cursor, IntoRecords, Records, SeekMode};
pub use database::{Database, DatabaseInfo};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use flags::{OpenFlags, MEMORY_PATH};
pub use lock::{journal_path, lock_path};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{TransactionGuard, TransactionManager, TransactionState};
pub use types::{PageNo, TransactionId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
#[must_use]
pub fn version() -> &'static str {
    VERSION
}

/// Returns `true`: a [`Database`] may be shared between threads.
///
/// Internal state is guarded by a mutex. This gives mutual exclusion only;
/// there is still a single writer and no snapshot isolation.
#[must_use]
pub const fn is_threadsafe() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn database_is_shareable() {
        assert_send_sync::<Database>();
        assert!(is_threadsafe());
    }

    #[test]
    fn version_matches_package() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
        assert!(!version().is_empty());
    }
}
