//! Database facade.

use crate::btree::{self, VerifyReport, WriteMode};
use crate::collection::Collection;
use crate::config::{Config, ConfigPayload, ConfigRequest, ThreadingMode, DEFAULT_ENGINE};
use crate::cursor::Cursor;
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::flags::{OpenFlags, MEMORY_PATH};
use crate::journal::Journal;
use crate::lock::{journal_path, lock_path, FileLock};
use crate::pager::{Pager, PagerOptions};
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{TransactionGuard, TransactionManager, TransactionState};
use crate::types::TransactionId;
use parking_lot::{Condvar, Mutex, MutexGuard};
use quarry_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Corrupt,
    Closed,
}

/// State guarded by the handle mutex.
struct Engine {
    pager: Option<Pager>,
    status: Status,
    txn: TransactionManager,
    config: Config,
    flags: OpenFlags,
    /// Bumped by every mutation and rollback; cursors use it to notice change.
    generation: u64,
    lock: Option<FileLock>,
    path: Option<PathBuf>,
}

impl Engine {
    fn check_open(&self) -> CoreResult<()> {
        match self.status {
            Status::Open => Ok(()),
            Status::Corrupt => Err(CoreError::corrupt("store is marked corrupt; reopen it")),
            Status::Closed => Err(CoreError::DatabaseClosed),
        }
    }

    fn check_writable(&self) -> CoreResult<()> {
        self.check_open()?;
        if self.flags.is_writable() {
            Ok(())
        } else {
            Err(CoreError::ReadOnly)
        }
    }

    fn pager_mut(&mut self) -> CoreResult<&mut Pager> {
        self.check_open()?;
        self.pager.as_mut().ok_or(CoreError::DatabaseClosed)
    }

    fn mark_corrupt(&mut self, err: &CoreError) {
        if self.status == Status::Open {
            error!(error = %err, "store marked corrupt");
            self.status = Status::Corrupt;
        }
    }

    /// Marks the store corrupt if `err` says so, then hands it back.
    fn note(&mut self, err: CoreError) -> CoreError {
        if err.is_corruption() {
            self.mark_corrupt(&err);
        }
        err
    }
}

/// Errors a caller can trigger before the tree is touched. They leave an
/// open transaction intact.
fn is_caller_error(err: &CoreError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::InvalidArgument
            | ErrorKind::NotFound
            | ErrorKind::AlreadyExists
            | ErrorKind::InvalidState
            | ErrorKind::UnknownConfig
    )
}

/// Static facts about an open database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// File path, `None` in memory.
    pub path: Option<PathBuf>,
    /// Format version as `(major, minor)`.
    pub version: (u16, u16),
    /// Page size in bytes.
    pub page_size: usize,
    /// Pages in the file, header included.
    pub page_count: u64,
    /// Pages on the free list.
    pub free_pages: u64,
    /// Stored records.
    pub record_count: u64,
    /// Committed transactions over the life of the file.
    pub commit_counter: u64,
    /// Key/value engine name.
    pub engine: String,
    /// Whether a rollback journal is in use.
    pub journal: bool,
    /// Whether the handle is read-only.
    pub read_only: bool,
    /// Whether the store lives in memory.
    pub in_memory: bool,
    /// Whether auto-commit is on.
    pub auto_commit: bool,
}

/// An open QuarryDB store.
///
/// `Database` is the entry point for key/value access, transactions, cursors
/// and document collections. It can be shared between threads: internal
/// state sits behind a mutex and one thread at a time may own the write
/// transaction.
///
/// # Opening a Database
///
/// ```rust
/// use quarry_core::{Database, OpenFlags};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = Database::open(dir.path().join("app.db"), OpenFlags::default()).unwrap();
///
/// db.store(b"nombre", b"Juan").unwrap();
/// assert_eq!(db.fetch(b"nombre").unwrap(), Some(b"Juan".to_vec()));
///
/// db.close().unwrap();
/// ```
///
/// # Transactions
///
/// Writes outside a transaction commit immediately unless auto-commit is
/// disabled. Group writes with [`Database::begin`]/[`Database::commit`] or
/// the scoped helpers:
///
/// ```rust
/// use quarry_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// db.with_transaction(|db| {
///     db.store(b"pais", b"Spain")?;
///     db.store(b"ciudad", b"Madrid")
/// })
/// .unwrap();
/// assert!(db.exists(b"pais").unwrap());
/// ```
pub struct Database {
    inner: Mutex<Engine>,
    txn_released: Condvar,
    open_cursors: AtomicUsize,
    stats: Arc<DatabaseStats>,
}

impl Database {
    /// Opens a database file with default configuration.
    ///
    /// The path `":mem:"` opens an in-memory store.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file is missing and `CREATE` is not set
    /// - `AlreadyExists` if the file exists and `EXCLUSIVE` is set
    /// - `DatabaseLocked` if another handle has the file open
    /// - `UnsupportedFormat` or `Corrupt` for a file this version cannot use
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> CoreResult<Self> {
        Self::open_with_config(path, flags, Config::default())
    }

    /// Opens a database file with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open`]; also `InvalidArgument` or `UnknownConfig` for
    /// a bad configuration or contradictory flags.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        flags: OpenFlags,
        config: Config,
    ) -> CoreResult<Self> {
        flags.validate()?;
        config.validate()?;
        let path = path.as_ref();
        if flags.contains(OpenFlags::IN_MEMORY) || path.as_os_str() == MEMORY_PATH {
            return Self::open_memory(flags | OpenFlags::IN_MEMORY, config);
        }

        let read_only = !flags.is_writable();
        let exists = path.exists();
        if exists && flags.contains(OpenFlags::EXCLUSIVE) {
            return Err(CoreError::already_exists(path.display().to_string()));
        }
        if !exists && (read_only || !flags.contains(OpenFlags::CREATE)) {
            return Err(CoreError::not_found(path.display().to_string()));
        }
        if flags.contains(OpenFlags::MEMORY_MAPPED) {
            debug!("memory-mapped reads requested; using buffered file I/O");
        }

        let lock = FileLock::acquire(path, read_only)?;
        let mut main: Box<dyn StorageBackend> = if read_only {
            Box::new(FileBackend::open_read_only(path)?)
        } else if flags.contains(OpenFlags::EXCLUSIVE) {
            Box::new(FileBackend::create_new(path)?)
        } else {
            Box::new(FileBackend::open(path)?)
        };

        let journal_file = journal_path(path);
        let journal: Option<Box<dyn StorageBackend>> = if read_only {
            if journal_file.exists() {
                let backend = FileBackend::open_read_only(&journal_file)?;
                // an empty journal is left from a clean run and needs no access
                Journal::is_hot(&backend)?.then(|| Box::new(backend) as Box<dyn StorageBackend>)
            } else {
                None
            }
        } else if flags.contains(OpenFlags::OMIT_JOURNAL) {
            if journal_file.exists() {
                let mut leftover = Journal::new(Box::new(FileBackend::open(&journal_file)?));
                leftover.recover(main.as_mut(), None)?;
                drop(leftover);
                fs::remove_file(&journal_file)?;
            }
            None
        } else {
            Some(Box::new(FileBackend::open(&journal_file)?))
        };

        Self::build(main, journal, flags, config, Some(lock), Some(path.to_path_buf()))
    }

    /// Opens an empty in-memory database with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be initialised.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_memory(OpenFlags::default() | OpenFlags::IN_MEMORY, Config::default())
    }

    fn open_memory(flags: OpenFlags, config: Config) -> CoreResult<Self> {
        let journal: Option<Box<dyn StorageBackend>> = if flags.contains(OpenFlags::OMIT_JOURNAL)
        {
            None
        } else {
            Some(Box::new(InMemoryBackend::new()))
        };
        Self::build(
            Box::new(InMemoryBackend::new()),
            journal,
            flags,
            config,
            None,
            None,
        )
    }

    /// Opens a database over caller-supplied backends.
    ///
    /// Pass `None` for `journal` to run without one. No file lock is taken.
    ///
    /// # Errors
    ///
    /// As for [`Database::open_with_config`].
    pub fn open_with_backends(
        main: Box<dyn StorageBackend>,
        journal: Option<Box<dyn StorageBackend>>,
        flags: OpenFlags,
        config: Config,
    ) -> CoreResult<Self> {
        flags.validate()?;
        config.validate()?;
        Self::build(main, journal, flags, config, None, None)
    }

    fn build(
        main: Box<dyn StorageBackend>,
        journal: Option<Box<dyn StorageBackend>>,
        flags: OpenFlags,
        config: Config,
        lock: Option<FileLock>,
        path: Option<PathBuf>,
    ) -> CoreResult<Self> {
        let stats = Arc::new(DatabaseStats::new());
        let options = PagerOptions {
            page_size: config.page_size,
            cache_pages: config.cache_pages,
            engine: config.engine.clone(),
            read_only: !flags.is_writable(),
            sync_on_commit: config.sync_on_commit,
        };
        let (pager, recovery) = Pager::open(main, journal, options, Arc::clone(&stats))?;
        info!(
            path = %path.as_deref().map_or_else(|| MEMORY_PATH.into(), |p| p.display().to_string()),
            page_size = pager.page_size(),
            pages = pager.page_count(),
            records = pager.header().record_count,
            recovered = recovery.is_some(),
            "database opened"
        );

        Ok(Self {
            inner: Mutex::new(Engine {
                pager: Some(pager),
                status: Status::Open,
                txn: TransactionManager::new(),
                config,
                flags,
                generation: 0,
                lock,
                path,
            }),
            txn_released: Condvar::new(),
            open_cursors: AtomicUsize::new(0),
            stats,
        })
    }

    // ========================================================================
    // Key/value operations
    // ========================================================================

    /// Inserts or overwrites a record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty or oversized key, `ReadOnly` on a
    /// read-only handle, or a storage error.
    pub fn store(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let result = self.write_op(|pager| btree::put(pager, key, value, WriteMode::Store));
        self.track(result.map(|_| self.stats.record_write()))
    }

    /// Appends `value` to the record at `key`, creating it if absent.
    ///
    /// # Errors
    ///
    /// As for [`Database::store`].
    pub fn append(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let result = self.write_op(|pager| btree::put(pager, key, value, WriteMode::Append));
        self.track(result.map(|_| self.stats.record_append()))
    }

    /// Reads a record. A missing key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key, or a storage error.
    pub fn fetch(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let result = non_empty(key).and_then(|()| self.read_op(|pager| btree::get(pager, key)));
        self.stats.record_read();
        self.track(result)
    }

    /// Removes a record. Returns `false` if the key was absent.
    ///
    /// # Errors
    ///
    /// As for [`Database::store`].
    pub fn delete(&self, key: &[u8]) -> CoreResult<bool> {
        let result = self.write_op(|pager| btree::remove(pager, key));
        if let Ok(true) = result {
            self.stats.record_delete();
        }
        self.track(result)
    }

    /// Returns `true` if a record exists at `key`.
    ///
    /// # Errors
    ///
    /// As for [`Database::fetch`].
    pub fn exists(&self, key: &[u8]) -> CoreResult<bool> {
        let result =
            non_empty(key).and_then(|()| self.read_op(|pager| btree::contains(pager, key)));
        self.stats.record_read();
        self.track(result)
    }

    /// Number of stored records, including uncommitted changes.
    ///
    /// Collection documents and metadata are records too; see
    /// [`is_reserved_key`](crate::is_reserved_key).
    ///
    /// # Errors
    ///
    /// Fails if the handle is closed or corrupt.
    pub fn record_count(&self) -> CoreResult<u64> {
        self.read_op(|pager| Ok(pager.header().record_count))
    }

    /// Opens a cursor over the records, collection keys included.
    ///
    /// # Errors
    ///
    /// Fails if the handle is closed or corrupt.
    pub fn cursor(&self) -> CoreResult<Cursor<'_>> {
        self.inner.lock().check_open()?;
        Ok(Cursor::new(self))
    }

    /// Returns a handle to the document collection called `name`.
    ///
    /// The collection itself need not exist yet; see [`Collection::create`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unusable name.
    pub fn collection(&self, name: &str) -> CoreResult<Collection<'_>> {
        Collection::new(self, name)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Opens an explicit transaction owned by the calling thread.
    ///
    /// If the calling thread holds the implicit transaction left open by a
    /// write with auto-commit disabled, that transaction becomes explicit.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if this thread already has an explicit transaction,
    ///   or another thread has one and the threading mode is `FailFast`
    /// - `ReadOnly` on a read-only handle
    pub fn begin(&self) -> CoreResult<TransactionId> {
        let me = thread::current().id();
        let mut engine = self.inner.lock();
        engine.check_writable()?;
        if engine.txn.is_open() && !engine.txn.held_by_other(me) {
            if !engine.txn.is_implicit() {
                return self.track(Err(CoreError::AlreadyActive));
            }
            engine.txn.make_explicit();
            return engine.txn.current().ok_or(CoreError::AlreadyActive);
        }
        self.wait_for_writer(&mut engine, me)?;
        engine.check_writable()?;
        self.begin_locked(&mut engine, me, false)
    }

    /// Commits the active transaction.
    ///
    /// On failure the transaction stays active; retry or roll back.
    ///
    /// # Errors
    ///
    /// `InvalidState` without an active transaction owned by this thread,
    /// or the storage error that stopped the commit.
    pub fn commit(&self) -> CoreResult<()> {
        let me = thread::current().id();
        let mut engine = self.inner.lock();
        engine.check_open()?;
        if !engine.txn.is_open() {
            return Err(CoreError::invalid_state("no active transaction to commit"));
        }
        if engine.txn.held_by_other(me) {
            return Err(CoreError::invalid_state(
                "the active transaction belongs to another thread",
            ));
        }
        let result = self.commit_locked(&mut engine).map_err(|e| engine.note(e));
        self.track(result)
    }

    /// Rolls back the active transaction. Without one this is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidState` if another thread owns the transaction; a failed
    /// restore marks the store corrupt.
    pub fn rollback(&self) -> CoreResult<()> {
        let me = thread::current().id();
        let mut engine = self.inner.lock();
        engine.check_open()?;
        if !engine.txn.is_open() {
            return Ok(());
        }
        if engine.txn.held_by_other(me) {
            return Err(CoreError::invalid_state(
                "the active transaction belongs to another thread",
            ));
        }
        let result = self.rollback_locked(&mut engine);
        self.track(result)
    }

    /// Begins a transaction that rolls back when the guard drops uncommitted.
    ///
    /// # Errors
    ///
    /// As for [`Database::begin`].
    pub fn transaction(&self) -> CoreResult<TransactionGuard<'_>> {
        self.begin()?;
        Ok(TransactionGuard::new(self))
    }

    /// Runs `f` in a transaction, committing on `Ok` and rolling back on
    /// `Err`.
    ///
    /// # Errors
    ///
    /// The error from `f`, from [`Database::begin`] or from the commit.
    pub fn with_transaction<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Self) -> CoreResult<T>,
    {
        let guard = self.transaction()?;
        let value = f(self)?;
        guard.commit()?;
        Ok(value)
    }

    /// State of the handle's transaction.
    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.inner.lock().txn.state()
    }

    fn wait_for_writer(&self, engine: &mut MutexGuard<'_, Engine>, me: ThreadId) -> CoreResult<()> {
        while engine.txn.held_by_other(me) {
            if engine.config.threading == ThreadingMode::FailFast {
                return Err(CoreError::AlreadyActive);
            }
            self.txn_released.wait(engine);
        }
        Ok(())
    }

    fn begin_locked(
        &self,
        engine: &mut Engine,
        owner: ThreadId,
        implicit: bool,
    ) -> CoreResult<TransactionId> {
        let txid = engine.txn.begin(owner, implicit)?;
        if let Err(err) = engine.pager_mut().and_then(|pager| pager.begin(txid)) {
            engine.txn.finish_rollback();
            self.txn_released.notify_all();
            return Err(err);
        }
        self.stats.record_transaction_start();
        debug!(%txid, implicit, "transaction started");
        Ok(txid)
    }

    fn commit_locked(&self, engine: &mut Engine) -> CoreResult<()> {
        let txid = engine.txn.start_commit()?;
        match engine.pager_mut().and_then(Pager::commit) {
            Ok(()) => {
                engine.txn.finish_commit();
                self.stats.record_transaction_commit();
                self.txn_released.notify_all();
                debug!(%txid, "transaction committed");
                Ok(())
            }
            Err(err) => {
                engine.txn.abort_commit();
                warn!(%txid, error = %err, "commit failed; transaction stays active");
                Err(err)
            }
        }
    }

    fn rollback_locked(&self, engine: &mut Engine) -> CoreResult<()> {
        let Some(txid) = engine.txn.current() else {
            return Ok(());
        };
        let result = engine.pager.as_mut().map_or(Ok(()), Pager::rollback);
        engine.txn.finish_rollback();
        engine.generation += 1;
        self.stats.record_transaction_rollback();
        self.txn_released.notify_all();
        match result {
            Ok(()) => {
                debug!(%txid, "transaction rolled back");
                Ok(())
            }
            Err(err) => {
                engine.mark_corrupt(&err);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Operation plumbing
    // ========================================================================

    /// Runs a read against the pager.
    pub(crate) fn read_op<T>(&self, op: impl FnOnce(&mut Pager) -> CoreResult<T>) -> CoreResult<T> {
        self.read_at(|pager, _| op(pager))
    }

    /// Runs a read and also passes the current mutation generation.
    pub(crate) fn read_at<T>(
        &self,
        op: impl FnOnce(&mut Pager, u64) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut engine = self.inner.lock();
        let generation = engine.generation;
        let result = engine.pager_mut().and_then(|pager| op(pager, generation));
        result.map_err(|e| engine.note(e))
    }

    /// Runs a mutation inside the handle's transaction, opening an implicit
    /// one if needed and auto-committing it afterwards.
    ///
    /// A storage failure rolls the whole transaction back, since the tree
    /// may be half-updated. Caller errors leave an explicit transaction
    /// untouched.
    pub(crate) fn write_op<T>(
        &self,
        op: impl FnOnce(&mut Pager) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let me = thread::current().id();
        let mut engine = self.inner.lock();
        self.wait_for_writer(&mut engine, me)?;
        engine.check_writable()?;

        let began_here = !engine.txn.is_open();
        if began_here {
            self.begin_locked(&mut engine, me, true)?;
        }
        let result = engine.pager_mut().and_then(op);
        engine.generation += 1;

        match result {
            Ok(value) => {
                if engine.txn.is_implicit() && engine.config.auto_commit {
                    if let Err(err) = self.commit_locked(&mut engine) {
                        warn!(error = %err, "auto-commit failed; rolling back");
                        let _ = self.rollback_locked(&mut engine);
                        return Err(engine.note(err));
                    }
                }
                Ok(value)
            }
            Err(err) => {
                let abort = !is_caller_error(&err);
                if abort || (began_here && engine.config.auto_commit) {
                    if abort {
                        warn!(error = %err, "write failed; rolling back transaction");
                    }
                    let _ = self.rollback_locked(&mut engine);
                }
                Err(engine.note(err))
            }
        }
    }

    pub(crate) fn cursor_opened(&self) {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn cursor_closed(&self) {
        self.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn stats_handle(&self) -> &DatabaseStats {
        &self.stats
    }

    fn track<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }

    // ========================================================================
    // Configuration and introspection
    // ========================================================================

    /// Applies a configuration change.
    ///
    /// # Errors
    ///
    /// `UnknownConfig` for an unsupported engine, `InvalidArgument` for a
    /// zero cache size.
    pub fn configure(&self, request: ConfigRequest) -> CoreResult<()> {
        let mut engine = self.inner.lock();
        engine.check_open()?;
        match &request {
            ConfigRequest::MaxPageCache(pages) => {
                if *pages == 0 {
                    return Err(CoreError::invalid_argument("cache must hold at least one page"));
                }
                engine.pager_mut()?.set_cache_capacity(*pages);
                engine.config.cache_pages = *pages;
            }
            ConfigRequest::DisableAutoCommit => engine.config.auto_commit = false,
            ConfigRequest::EnableAutoCommit => engine.config.auto_commit = true,
            ConfigRequest::KvEngine(name) => {
                if name != DEFAULT_ENGINE {
                    return Err(CoreError::unknown_config(format!("engine {name}")));
                }
            }
            ConfigRequest::SyncOnCommit(value) => {
                engine.pager_mut()?.set_sync_on_commit(*value);
                engine.config.sync_on_commit = *value;
            }
        }
        info!(?request, "configuration changed");
        Ok(())
    }

    /// Parses a configuration verb and applies it.
    ///
    /// # Errors
    ///
    /// See [`ConfigRequest::parse`] and [`Database::configure`].
    pub fn configure_verb(&self, verb: &str, payload: ConfigPayload) -> CoreResult<()> {
        self.configure(ConfigRequest::parse(verb, payload)?)
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }

    /// Returns a snapshot of the statistics counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Describes the open store.
    ///
    /// # Errors
    ///
    /// Fails if the handle is closed or the free list is damaged.
    pub fn info(&self) -> CoreResult<DatabaseInfo> {
        let mut engine = self.inner.lock();
        let path = engine.path.clone();
        let flags = engine.flags;
        let auto_commit = engine.config.auto_commit;
        let pager = engine.pager_mut()?;
        let free_pages = pager.free_pages()?.len() as u64;
        let header = pager.header();
        Ok(DatabaseInfo {
            path,
            version: header.version,
            page_size: header.page_size,
            page_count: header.page_count,
            free_pages,
            record_count: header.record_count,
            commit_counter: header.commit_counter,
            engine: header.engine.clone(),
            journal: pager.has_journal(),
            read_only: !flags.is_writable(),
            in_memory: flags.contains(OpenFlags::IN_MEMORY),
            auto_commit,
        })
    }

    /// Checks every page of the store. A failure is reported, not recorded
    /// against the handle.
    ///
    /// # Errors
    ///
    /// `Corrupt` describing the first problem found.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let mut engine = self.inner.lock();
        let report = btree::verify(engine.pager_mut()?);
        match &report {
            Ok(r) => debug!(pages = r.pages, records = r.records, "verify passed"),
            Err(err) => warn!(error = %err, "verify failed"),
        }
        report
    }

    /// Returns `true` until [`Database::close`] succeeds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().status != Status::Closed
    }

    /// Returns `true` if a failure marked the store corrupt.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        self.inner.lock().status == Status::Corrupt
    }

    /// Path of the database file; `None` in memory.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Closes the store.
    ///
    /// An implicit transaction is committed, an explicit one rolled back.
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidState` while cursors are open or another thread owns the
    /// transaction; an I/O error if the final flush fails.
    pub fn close(&self) -> CoreResult<()> {
        self.close_inner(false)
    }

    fn close_inner(&self, force: bool) -> CoreResult<()> {
        let mut engine = self.inner.lock();
        if engine.status == Status::Closed {
            return Ok(());
        }
        if !force {
            if self.open_cursors.load(Ordering::SeqCst) > 0 {
                return Err(CoreError::invalid_state("cannot close with open cursors"));
            }
            if engine.txn.held_by_other(thread::current().id()) {
                return Err(CoreError::invalid_state(
                    "the active transaction belongs to another thread",
                ));
            }
        }

        let mut result = Ok(());
        if engine.txn.is_open() {
            if engine.status == Status::Open && engine.txn.is_implicit() {
                result = self.commit_locked(&mut engine);
            }
            if engine.txn.is_open() {
                let _ = self.rollback_locked(&mut engine);
            }
        }
        if let Some(mut pager) = engine.pager.take() {
            if engine.status == Status::Open && !pager.is_read_only() {
                result = result.and(pager.flush());
            }
        }
        engine.status = Status::Closed;

        if let Some(path) = engine.path.clone() {
            remove_leftovers(&path, engine.flags.contains(OpenFlags::TEMPORARY));
        }
        engine.lock = None;
        if engine.flags.contains(OpenFlags::TEMPORARY) {
            if let Some(path) = &engine.path {
                let _ = fs::remove_file(lock_path(path));
            }
        }
        self.txn_released.notify_all();
        info!("database closed");
        result
    }
}

/// Removes an empty journal, or every file of a temporary store.
fn remove_leftovers(path: &Path, temporary: bool) {
    let journal = journal_path(path);
    if temporary {
        for file in [path, journal.as_path()] {
            if let Err(err) = fs::remove_file(file) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(file = %file.display(), error = %err, "could not remove temporary file");
                }
            }
        }
    } else if fs::metadata(&journal).is_ok_and(|m| m.len() == 0) {
        let _ = fs::remove_file(&journal);
    }
}

fn non_empty(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        Err(CoreError::invalid_argument("key must not be empty"))
    } else {
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.inner.lock();
        f.debug_struct("Database")
            .field("path", &engine.path)
            .field("status", &engine.status)
            .field("transaction", &engine.txn.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close_inner(true);
    }
}
