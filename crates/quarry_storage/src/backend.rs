//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for QuarryDB.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading and writing bytes at an offset, appending, and flushing data.
/// QuarryDB owns all file format interpretation - backends do not understand
/// pages, journals, or B-tree nodes.
///
/// # Invariants
///
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `write_at` past the current end grows the storage, zero-filling any gap
/// - `append` returns the offset where data was written
/// - `sync` ensures all written data is durable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and in-memory databases
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset`, overwriting existing bytes.
    ///
    /// Writing beyond the current size extends the storage. Any gap between
    /// the old end and `offset` reads back as zeroes.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size()?;
        self.write_at(offset, data)?;
        Ok(offset)
    }

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after it returns, all
    /// previously written data survives process termination and power loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// This removes all data after the specified offset. The journal uses it
    /// to discard pre-images at commit; rollback uses it to drop pages that
    /// were allocated inside the aborted transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The truncation fails
    /// - `new_size` is greater than current size
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Returns `true` if data written to this backend survives the process.
    fn is_durable(&self) -> bool {
        true
    }
}
