//! Fault injection and crash simulation.
//!
//! [`FaultyBackend`] wraps a storage backend and fails writes or syncs on
//! demand. [`CrashHarness`] runs a database over shared in-memory files and
//! "crashes" it by copying those files while work is in flight, then opens
//! a fresh handle over the copies so recovery can be checked.
//!
//! ## Usage
//!
//! ```rust
//! use quarry_testkit::crash::CrashHarness;
//!
//! let harness = CrashHarness::new();
//! let db = harness.open();
//! db.store(b"pais", b"Spain").unwrap();
//! db.begin().unwrap();
//! db.store(b"pais", b"France").unwrap();
//!
//! let recovered = harness.crash(db).open();
//! assert_eq!(recovered.fetch(b"pais").unwrap(), Some(b"Spain".to_vec()));
//! ```

use quarry_core::{Config, Database, OpenFlags};
use quarry_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Switches shared between a test and the [`FaultyBackend`] it handed to a
/// database.
#[derive(Debug, Default)]
pub struct FaultControl {
    write_budget: AtomicUsize,
    budget_armed: AtomicBool,
    fail_sync: AtomicBool,
    faults: AtomicUsize,
}

impl FaultControl {
    /// Lets `bytes` more bytes through, then fails every write. The write
    /// that crosses the limit is torn: its first part lands.
    pub fn fail_writes_after(&self, bytes: usize) {
        self.write_budget.store(bytes, Ordering::SeqCst);
        self.budget_armed.store(true, Ordering::SeqCst);
    }

    /// Makes `sync` and `flush` fail until cleared.
    pub fn fail_sync(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Clears every fault.
    pub fn heal(&self) {
        self.budget_armed.store(false, Ordering::SeqCst);
        self.fail_sync.store(false, Ordering::SeqCst);
    }

    /// Number of operations failed so far.
    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::SeqCst)
    }

    fn fault(&self, what: &str) -> StorageError {
        self.faults.fetch_add(1, Ordering::SeqCst);
        StorageError::Io(io::Error::other(format!("injected {what} fault")))
    }

    /// Bytes of a `len`-byte write allowed through, or `None` when the
    /// write may proceed in full.
    fn admit(&self, len: usize) -> Option<usize> {
        if !self.budget_armed.load(Ordering::SeqCst) {
            return None;
        }
        let budget = self.write_budget.load(Ordering::SeqCst);
        if len <= budget {
            self.write_budget.store(budget - len, Ordering::SeqCst);
            None
        } else {
            self.write_budget.store(0, Ordering::SeqCst);
            Some(budget)
        }
    }
}

/// A storage backend wrapper that fails on command.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<FaultControl>,
}

impl FaultyBackend {
    /// Wraps `inner`; the returned control drives its faults.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<FaultControl>) {
        let control = Arc::new(FaultControl::default());
        let backend = Self {
            inner,
            control: Arc::clone(&control),
        };
        (backend, control)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        match self.control.admit(data.len()) {
            None => self.inner.write_at(offset, data),
            Some(partial) => {
                if partial > 0 {
                    self.inner.write_at(offset, &data[..partial])?;
                }
                Err(self.control.fault("write"))
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_sync.load(Ordering::SeqCst) {
            return Err(self.control.fault("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_sync.load(Ordering::SeqCst) {
            return Err(self.control.fault("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.control.admit(1).is_some() {
            return Err(self.control.fault("truncate"));
        }
        self.inner.truncate(new_size)
    }

    fn is_durable(&self) -> bool {
        self.inner.is_durable()
    }
}

/// Runs a database over in-memory main and journal files that outlive the
/// handle.
#[derive(Clone)]
pub struct CrashHarness {
    main: InMemoryBackend,
    journal: InMemoryBackend,
    config: Config,
}

impl Default for CrashHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl CrashHarness {
    /// Empty files with a small page size and cache, so that transactions
    /// spill dirty pages early.
    pub fn new() -> Self {
        Self::with_config(Config::new().page_size(512).cache_pages(8))
    }

    /// Empty files with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            main: InMemoryBackend::new(),
            journal: InMemoryBackend::new(),
            config,
        }
    }

    /// Opens a handle over the files. Recovery runs here when the journal
    /// is hot.
    pub fn open(&self) -> Database {
        Database::open_with_backends(
            Box::new(self.main.clone()),
            Some(Box::new(self.journal.clone())),
            OpenFlags::default(),
            self.config.clone(),
        )
        .expect("Failed to open database over harness files")
    }

    /// Opens a handle whose main file fails on command.
    pub fn open_faulty(&self) -> (Database, Arc<FaultControl>) {
        let (main, control) = FaultyBackend::new(Box::new(self.main.clone()));
        let db = Database::open_with_backends(
            Box::new(main),
            Some(Box::new(self.journal.clone())),
            OpenFlags::default(),
            self.config.clone(),
        )
        .expect("Failed to open database over harness files");
        (db, control)
    }

    /// Freezes the files as they are right now and abandons `db` without
    /// letting it clean up. The returned harness holds the frozen copies.
    pub fn crash(&self, db: Database) -> CrashHarness {
        let frozen = Self {
            main: InMemoryBackend::with_data(self.main.data()),
            journal: InMemoryBackend::with_data(self.journal.data()),
            config: self.config.clone(),
        };
        // a crashed process runs no destructors
        std::mem::forget(db);
        frozen
    }

    /// Current bytes of the main file.
    pub fn main_bytes(&self) -> Vec<u8> {
        self.main.data()
    }

    /// Current bytes of the journal.
    pub fn journal_bytes(&self) -> Vec<u8> {
        self.journal.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::numbered_key;
    use quarry_core::{ErrorKind, TransactionState};

    #[test]
    fn uncommitted_work_is_undone_after_a_crash() {
        let harness = CrashHarness::new();
        let db = harness.open();
        for i in 0..150 {
            db.store(&numbered_key(i), &[b'a'; 32]).unwrap();
        }
        let committed = harness.main_bytes();

        db.begin().unwrap();
        for i in 0..300 {
            db.store(&numbered_key(i), &[b'b'; 48]).unwrap();
        }
        let crashed = harness.crash(db);
        assert!(!crashed.journal_bytes().is_empty());

        let recovered = crashed.open();
        assert_eq!(crashed.main_bytes(), committed);
        assert_eq!(recovered.record_count().unwrap(), 150);
        assert_eq!(recovered.verify().unwrap().records, 150);
    }

    #[test]
    fn committed_work_survives_a_crash() {
        let harness = CrashHarness::new();
        let db = harness.open();
        db.with_transaction(|db| {
            for i in 0..50 {
                db.store(&numbered_key(i), b"v")?;
            }
            Ok(())
        })
        .unwrap();
        let recovered = harness.crash(db).open();
        assert_eq!(recovered.record_count().unwrap(), 50);
    }

    #[test]
    fn failed_sync_keeps_the_transaction_open_for_retry() {
        let harness = CrashHarness::new();
        let (db, control) = harness.open_faulty();
        db.begin().unwrap();
        db.store(b"pais", b"Spain").unwrap();

        control.fail_sync(true);
        let err = db.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(db.transaction_state(), TransactionState::Active);
        assert!(control.faults() > 0);

        control.heal();
        db.commit().unwrap();
        assert_eq!(db.fetch(b"pais").unwrap(), Some(b"Spain".to_vec()));
    }

    #[test]
    fn torn_commit_recovers_the_previous_state() {
        let harness = CrashHarness::new();
        let (db, control) = harness.open_faulty();
        db.store(b"ciudad", b"Madrid").unwrap();

        db.begin().unwrap();
        for i in 0..40 {
            db.store(&numbered_key(i), &[b'x'; 64]).unwrap();
        }
        control.fail_writes_after(700);
        assert!(db.commit().is_err());

        let recovered = harness.crash(db).open();
        assert_eq!(recovered.fetch(b"ciudad").unwrap(), Some(b"Madrid".to_vec()));
        assert_eq!(recovered.fetch(&numbered_key(0)).unwrap(), None);
        recovered.verify().unwrap();
    }

    #[test]
    fn failed_rollback_marks_the_store_corrupt() {
        let harness = CrashHarness::new();
        let (db, control) = harness.open_faulty();
        db.store(b"ciudad", b"Madrid").unwrap();

        db.begin().unwrap();
        for i in 0..40 {
            db.store(&numbered_key(i), &[b'x'; 64]).unwrap();
        }
        control.fail_writes_after(0);
        let err = db.rollback().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(db.is_corrupt());

        // every later operation is refused, close is still allowed
        control.heal();
        assert_eq!(db.fetch(b"ciudad").unwrap_err().kind(), ErrorKind::CorruptStore);
        assert_eq!(db.store(b"k", b"v").unwrap_err().kind(), ErrorKind::CorruptStore);
        assert_eq!(db.begin().unwrap_err().kind(), ErrorKind::CorruptStore);
        assert!(db.cursor().is_err());
        db.close().unwrap();
        db.close().unwrap();

        let reopened = harness.open();
        assert!(!reopened.is_corrupt());
        assert_eq!(reopened.fetch(b"ciudad").unwrap(), Some(b"Madrid".to_vec()));
        assert_eq!(reopened.fetch(&numbered_key(0)).unwrap(), None);
        reopened.verify().unwrap();
    }
}
