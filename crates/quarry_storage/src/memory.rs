//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Databases opened with the `:mem:` path or the in-memory flag
/// - The journal of an in-memory database
///
/// Cloning a backend produces a second handle onto the **same** bytes. Crash
/// tests use this to keep a view of the "disk" after the database that wrote
/// it has been dropped.
///
/// # Example
///
/// ```rust
/// use quarry_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Replaces the contents of the backend.
    pub fn set_data(&self, data: Vec<u8>) {
        *self.data.write() = data;
    }

    /// Clears all data from the backend.
    pub fn clear(&mut self) {
        self.data.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn write_at(&mut self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start.saturating_add(new_data.len());
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let current_size = data.len() as u64;

        if new_size > current_size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, current_size
                ),
            )));
        }

        data.truncate(new_size as usize);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
        assert!(!backend.is_durable());
    }

    #[test]
    fn memory_append_returns_correct_offset() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn memory_write_at_overwrites_in_place() {
        let mut backend = InMemoryBackend::with_data(b"hello world".to_vec());
        backend.write_at(6, b"WORLD").unwrap();
        assert_eq!(backend.data(), b"hello WORLD");
        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn memory_write_at_past_end_zero_fills() {
        let mut backend = InMemoryBackend::new();
        backend.write_at(4, b"ab").unwrap();
        assert_eq!(backend.data(), vec![0, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn memory_read_at_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_empty_read() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(backend.read_at(2, 0).unwrap().is_empty());
    }

    #[test]
    fn memory_clones_share_bytes() {
        let mut writer = InMemoryBackend::new();
        let observer = writer.clone();
        writer.append(b"shared").unwrap();
        assert_eq!(observer.data(), b"shared");

        observer.set_data(b"reset".to_vec());
        assert_eq!(writer.read_at(0, 5).unwrap(), b"reset");
    }

    #[test]
    fn memory_truncate() {
        let mut backend = InMemoryBackend::with_data(b"hello world".to_vec());

        backend.truncate(5).unwrap();
        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");

        assert!(backend.truncate(100).is_err());

        backend.truncate(0).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn write_at_matches_vec_model(
                writes in prop::collection::vec((0u64..256, prop::collection::vec(any::<u8>(), 0..64)), 1..20)
            ) {
                let mut backend = InMemoryBackend::new();
                let mut model: Vec<u8> = Vec::new();
                for (offset, bytes) in &writes {
                    backend.write_at(*offset, bytes).unwrap();
                    let end = *offset as usize + bytes.len();
                    if end > model.len() {
                        model.resize(end, 0);
                    }
                    model[*offset as usize..end].copy_from_slice(bytes);
                }
                prop_assert_eq!(backend.data(), model);
            }
        }
    }
}
