//! Rollback journal for atomic commit and crash recovery.
//!
//! Before a page below the transaction's original page count is changed for
//! the first time, its on-disk image is appended to the journal. Pages
//! allocated past that count need no record because rollback truncates the
//! file back to it.
//!
//! ## Format
//!
//! ```text
//! header:  | "QJOURNAL" (8) | page size (4) | original page count (8) | txid (8) | crc32 (4) |
//! record:  | page number (8) | pre-image (page size) | crc32 (4) |
//! ```
//!
//! ## Protocol
//!
//! - The journal is synced before any modified page reaches the database file.
//! - Commit writes the pages, syncs the file, then truncates the journal to
//!   zero length. The truncation is the commit point.
//! - Rollback and hot-journal recovery write the pre-images back newest
//!   first, truncate the file to the original page count and sync it.
//! - Recovery stops at the first torn or damaged record. Records after the
//!   last sync cannot describe pages that were overwritten.

mod record;
mod writer;

pub use record::{JournalHeader, JournalRecord, JOURNAL_HEADER_SIZE};
pub use writer::{Journal, RecoveryReport};
