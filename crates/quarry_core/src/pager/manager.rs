//! The pager: page I/O, caching and the transaction write path.

use super::cache::PageCache;
use super::header::{Header, HEADER_LEN};
use super::page::{Page, PageType};
use crate::config::DEFAULT_ENGINE;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, RecoveryReport};
use crate::stats::DatabaseStats;
use crate::types::{PageNo, TransactionId};
use quarry_storage::StorageBackend;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings the pager needs at open time.
#[derive(Debug, Clone)]
pub struct PagerOptions {
    /// Page size used when creating a new file.
    pub page_size: usize,
    /// Page cache capacity.
    pub cache_pages: usize,
    /// Engine name recorded in new files.
    pub engine: String,
    /// Refuse every write.
    pub read_only: bool,
    /// Sync the database file at commit.
    pub sync_on_commit: bool,
}

/// Owns the database file and mediates every page access.
///
/// Outside a transaction the pager is read-only. Inside one, modified pages
/// are kept in the cache (and journaled on first touch) until commit writes
/// them out or rollback discards them.
pub struct Pager {
    main: Box<dyn StorageBackend>,
    journal: Option<Journal>,
    header: Header,
    cache: PageCache,
    in_txn: bool,
    read_only: bool,
    sync_on_commit: bool,
    stats: Arc<DatabaseStats>,
}

impl Pager {
    /// Opens a pager over `main`, initialising an empty file and replaying a
    /// hot journal first.
    ///
    /// # Errors
    ///
    /// - `Busy` if a read-only open finds a journal that needs recovery
    /// - `UnsupportedFormat` for a foreign or newer file
    /// - `Corrupt` for a damaged header or a file shorter than its header says
    pub fn open(
        mut main: Box<dyn StorageBackend>,
        journal: Option<Box<dyn StorageBackend>>,
        options: PagerOptions,
        stats: Arc<DatabaseStats>,
    ) -> CoreResult<(Self, Option<RecoveryReport>)> {
        let mut recovery = None;
        let journal = match journal {
            Some(backend) => {
                if Journal::is_hot(backend.as_ref())? && options.read_only {
                    return Err(CoreError::busy(
                        "a hot journal needs recovery; open the database read-write",
                    ));
                }
                let mut journal = Journal::new(backend);
                let expected = read_header(main.as_ref()).ok().map(|h| h.page_size);
                recovery = journal.recover(main.as_mut(), expected)?;
                Some(journal)
            }
            None => None,
        };

        let header = if main.size()? == 0 {
            if options.read_only {
                return Err(CoreError::unsupported_format("database file is empty"));
            }
            let header = Header::new(options.page_size, &options.engine);
            main.write_at(0, &header.encode())?;
            main.sync()?;
            debug!(page_size = header.page_size, "initialised new database file");
            header
        } else {
            let header = read_header(main.as_ref())?;
            if header.engine != DEFAULT_ENGINE {
                return Err(CoreError::unsupported_format(format!(
                    "unknown engine {:?}",
                    header.engine
                )));
            }
            let expected = header.page_count * header.page_size as u64;
            let actual = main.size()?;
            if actual < expected {
                return Err(CoreError::corrupt(format!(
                    "file holds {actual} bytes but the header claims {} pages",
                    header.page_count
                )));
            }
            header
        };

        let pager = Self {
            main,
            journal,
            header,
            cache: PageCache::new(options.cache_pages),
            in_txn: false,
            read_only: options.read_only,
            sync_on_commit: options.sync_on_commit,
            stats,
        };
        Ok((pager, recovery))
    }

    /// Current header, including uncommitted changes.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.header.page_size
    }

    /// Number of pages in the file.
    pub fn page_count(&self) -> u64 {
        self.header.page_count
    }

    /// B+tree root page.
    pub fn root(&self) -> PageNo {
        self.header.root
    }

    /// Points the header at a new B+tree root.
    pub fn set_root(&mut self, root: PageNo) {
        self.header.root = root;
    }

    /// Adds `delta` to the record count.
    pub fn adjust_record_count(&mut self, delta: i64) {
        self.header.record_count = self.header.record_count.saturating_add_signed(delta);
    }

    pub(super) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Drops a freed page from the cache so it is not written at commit.
    pub(super) fn forget(&mut self, no: PageNo) {
        self.cache.discard(no);
    }

    /// Returns `true` if the file was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns `true` if the pager keeps a rollback journal.
    pub fn has_journal(&self) -> bool {
        self.journal.is_some()
    }

    /// Returns `true` between `begin` and `commit`/`rollback`.
    pub fn in_transaction(&self) -> bool {
        self.in_txn
    }

    /// Changes the cache capacity.
    pub fn set_cache_capacity(&mut self, pages: usize) {
        self.cache.resize(pages);
    }

    /// Cache capacity in pages.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Changes whether commit syncs the database file.
    pub fn set_sync_on_commit(&mut self, value: bool) {
        self.sync_on_commit = value;
    }

    /// Starts a write transaction and journals the header page.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` on a read-only file and `InvalidState` if a
    /// transaction is already open.
    pub fn begin(&mut self, txid: TransactionId) -> CoreResult<()> {
        if self.read_only {
            return Err(CoreError::ReadOnly);
        }
        if self.in_txn {
            return Err(CoreError::invalid_state("pager transaction already open"));
        }
        let page_size = self.header.page_size;
        let page_count = self.header.page_count;
        if let Some(journal) = self.journal.as_mut() {
            journal.begin(txid, page_size, page_count)?;
            let image = self.main.read_at(0, page_size)?;
            journal.record(PageNo::NONE, &image)?;
        }
        self.in_txn = true;
        Ok(())
    }

    /// Reads a page through the cache.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` for a page outside the file or a damaged image.
    pub fn read(&mut self, no: PageNo) -> CoreResult<Page> {
        self.check_range(no)?;
        if let Some(page) = self.cache.get(no) {
            self.stats.record_cache_hit();
            return Ok(page.clone());
        }
        self.stats.record_cache_miss();
        let bytes = self
            .main
            .read_at(no.offset(self.header.page_size), self.header.page_size)?;
        self.stats.record_page_read();
        let page = Page::from_disk(no, bytes).inspect_err(|e| {
            warn!(page = %no, error = %e, "damaged page");
        })?;
        self.cache.insert_clean(page.clone());
        Ok(page)
    }

    /// Stores a modified page. The first change to a pre-existing page
    /// journals its on-disk image.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` outside a transaction and `Corrupt` for a page
    /// outside the file.
    pub fn write(&mut self, page: Page) -> CoreResult<()> {
        if !self.in_txn {
            return Err(CoreError::invalid_state("page write outside a transaction"));
        }
        let no = page.no();
        self.check_range(no)?;
        if let Some(journal) = self.journal.as_mut() {
            if journal.needs(no) {
                let page_size = self.header.page_size;
                let offset = no.offset(page_size);
                let image = if offset + page_size as u64 <= self.main.size()? {
                    self.main.read_at(offset, page_size)?
                } else {
                    vec![0u8; page_size]
                };
                journal.record(no, &image)?;
            }
        }
        self.cache.insert_dirty(page);
        if self.cache.over_capacity() {
            self.spill()?;
        }
        Ok(())
    }

    /// Creates a fresh page of the given type, reusing a free page if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the free list cannot be read.
    pub fn allocate(&mut self, page_type: PageType) -> CoreResult<Page> {
        let no = self.allocate_page()?;
        Ok(Page::new(no, self.header.page_size, page_type))
    }

    /// Writes dirty pages early so the cache stays bounded. Without a journal
    /// nothing can be undone, so dirty pages stay pinned instead.
    fn spill(&mut self) -> CoreResult<()> {
        let Some(journal) = self.journal.as_mut() else {
            return Ok(());
        };
        journal.sync()?;
        let page_size = self.header.page_size;
        let pages = self.cache.dirty_pages();
        let count = pages.len();
        for page in pages {
            self.main.write_at(page.no().offset(page_size), &page.to_disk())?;
            self.stats.record_page_write();
        }
        self.cache.mark_all_clean();
        self.stats.record_spill();
        debug!(pages = count, "spilled dirty pages");
        Ok(())
    }

    /// Makes the transaction durable.
    ///
    /// On failure the transaction stays open with its changes intact, so the
    /// caller can retry or roll back.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if any write or sync fails.
    pub fn commit(&mut self) -> CoreResult<()> {
        if !self.in_txn {
            return Err(CoreError::invalid_state("no pager transaction to commit"));
        }
        let mut header = self.header.clone();
        header.commit_counter += 1;

        if let Some(journal) = self.journal.as_mut() {
            journal.sync()?;
        }
        let page_size = header.page_size;
        self.main.write_at(0, &header.encode())?;
        let mut written = 1;
        for page in self.cache.dirty_pages() {
            self.main.write_at(page.no().offset(page_size), &page.to_disk())?;
            written += 1;
        }
        if self.sync_on_commit {
            self.main.sync()?;
        } else {
            self.main.flush()?;
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.commit()?;
        }

        for _ in 0..written {
            self.stats.record_page_write();
        }
        self.header = header;
        self.cache.mark_all_clean();
        self.in_txn = false;
        debug!(pages = written, commit = self.header.commit_counter, "committed");
        Ok(())
    }

    /// Undoes the transaction by replaying the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be restored. The store must then be
    /// treated as corrupt.
    pub fn rollback(&mut self) -> CoreResult<()> {
        if !self.in_txn {
            return Ok(());
        }
        self.cache.clear();
        self.in_txn = false;
        if let Some(journal) = self.journal.as_mut() {
            let restored = journal.rollback(self.main.as_mut())?;
            debug!(pages = restored, "rolled back");
        }
        self.header = read_header(self.main.as_ref())?;
        Ok(())
    }

    /// Flushes buffered writes outside a transaction.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        if !self.read_only {
            self.main.flush()?;
        }
        Ok(())
    }

    /// Drops every cached page.
    pub fn clear_cache(&mut self) {
        if !self.in_txn {
            self.cache.clear();
        }
    }

    fn check_range(&self, no: PageNo) -> CoreResult<()> {
        if no.is_none() || no.as_u64() >= self.header.page_count {
            return Err(CoreError::corrupt(format!(
                "{no} is outside the file ({} pages)",
                self.header.page_count
            )));
        }
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if self.in_txn {
            if let Err(e) = self.rollback() {
                warn!(error = %e, "rollback on drop failed");
            } else {
                info!("rolled back unfinished transaction on drop");
            }
        }
    }
}

fn read_header(main: &dyn StorageBackend) -> CoreResult<Header> {
    let size = main.size()?;
    let len = (size as usize).min(HEADER_LEN);
    Header::decode(&main.read_at(0, len)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use quarry_storage::InMemoryBackend;

    const PS: usize = 512;

    fn options() -> PagerOptions {
        PagerOptions {
            page_size: PS,
            cache_pages: 4,
            engine: DEFAULT_ENGINE.to_string(),
            read_only: false,
            sync_on_commit: true,
        }
    }

    fn open(main: &InMemoryBackend, journal: &InMemoryBackend) -> Pager {
        Pager::open(
            Box::new(main.clone()),
            Some(Box::new(journal.clone())),
            options(),
            Arc::new(DatabaseStats::new()),
        )
        .unwrap()
        .0
    }

    fn leaf_with(pager: &mut Pager, marker: u32) -> PageNo {
        let mut page = pager.allocate(PageType::Leaf).unwrap();
        page.write_u32(100, marker);
        let no = page.no();
        pager.write(page).unwrap();
        no
    }

    #[test]
    fn new_file_gets_a_header() {
        let main = InMemoryBackend::new();
        let pager = open(&main, &InMemoryBackend::new());
        assert_eq!(pager.page_count(), 1);
        assert_eq!(main.data().len(), PS);
    }

    #[test]
    fn committed_pages_survive_reopen() {
        let main = InMemoryBackend::new();
        let journal = InMemoryBackend::new();
        let no = {
            let mut pager = open(&main, &journal);
            pager.begin(TransactionId::new(1)).unwrap();
            let no = leaf_with(&mut pager, 42);
            pager.set_root(no);
            pager.commit().unwrap();
            no
        };
        assert!(journal.data().is_empty());

        let mut pager = open(&main, &journal);
        assert_eq!(pager.root(), no);
        assert_eq!(pager.header().commit_counter, 1);
        assert_eq!(pager.read(no).unwrap().read_u32(100), 42);
    }

    #[test]
    fn rollback_discards_changes_even_after_spill() {
        let main = InMemoryBackend::new();
        let journal = InMemoryBackend::new();
        let mut pager = open(&main, &journal);

        pager.begin(TransactionId::new(1)).unwrap();
        let first = leaf_with(&mut pager, 1);
        pager.commit().unwrap();
        let committed = main.data();

        pager.begin(TransactionId::new(2)).unwrap();
        let mut page = pager.read(first).unwrap();
        page.write_u32(100, 99);
        pager.write(page).unwrap();
        for i in 0..10 {
            leaf_with(&mut pager, i);
        }
        assert!(main.data().len() > committed.len(), "spill reached the file");

        pager.rollback().unwrap();
        assert_eq!(main.data(), committed);
        assert_eq!(pager.page_count(), 2);
        assert_eq!(pager.read(first).unwrap().read_u32(100), 1);
    }

    #[test]
    fn crash_mid_transaction_recovers_on_open() {
        let main = InMemoryBackend::new();
        let journal = InMemoryBackend::new();
        let committed = {
            let mut pager = open(&main, &journal);
            pager.begin(TransactionId::new(1)).unwrap();
            leaf_with(&mut pager, 1);
            pager.commit().unwrap();
            main.data()
        };

        // simulate a crash after a spill: copy the bytes, leak the pager
        let crashed_main = InMemoryBackend::new();
        let crashed_journal = InMemoryBackend::new();
        {
            let mut pager = open(&main, &journal);
            pager.begin(TransactionId::new(2)).unwrap();
            for i in 0..10 {
                leaf_with(&mut pager, i);
            }
            crashed_main.set_data(main.data());
            crashed_journal.set_data(journal.data());
            std::mem::forget(pager);
        }
        assert_ne!(crashed_main.data(), committed);

        let (_pager, report) = Pager::open(
            Box::new(crashed_main.clone()),
            Some(Box::new(crashed_journal.clone())),
            options(),
            Arc::new(DatabaseStats::new()),
        )
        .unwrap();
        assert_eq!(report.unwrap().txid, TransactionId::new(2));
        assert_eq!(crashed_main.data(), committed);
        assert!(crashed_journal.data().is_empty());
    }

    #[test]
    fn hot_journal_blocks_read_only_open() {
        let main = InMemoryBackend::new();
        let journal = InMemoryBackend::new();
        {
            let mut pager = open(&main, &journal);
            pager.begin(TransactionId::new(1)).unwrap();
            pager.spill().unwrap();
            std::mem::forget(pager);
        }
        let mut opts = options();
        opts.read_only = true;
        let err = Pager::open(
            Box::new(main),
            Some(Box::new(journal)),
            opts,
            Arc::new(DatabaseStats::new()),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[test]
    fn writes_need_a_transaction_and_a_valid_page() {
        let main = InMemoryBackend::new();
        let mut pager = open(&main, &InMemoryBackend::new());
        let page = Page::new(PageNo::new(1), PS, PageType::Leaf);
        assert_eq!(pager.write(page.clone()).unwrap_err().kind(), ErrorKind::InvalidState);

        pager.begin(TransactionId::new(1)).unwrap();
        assert!(pager.write(page).unwrap_err().is_corruption());
        assert!(pager.read(PageNo::NONE).unwrap_err().is_corruption());
    }

    #[test]
    fn damaged_page_is_reported() {
        let main = InMemoryBackend::new();
        let journal = InMemoryBackend::new();
        let no = {
            let mut pager = open(&main, &journal);
            pager.begin(TransactionId::new(1)).unwrap();
            let no = leaf_with(&mut pager, 5);
            pager.commit().unwrap();
            no
        };
        let mut raw = main.data();
        raw[no.offset(PS) as usize + 200] ^= 0x40;
        main.set_data(raw);

        let mut pager = open(&main, &journal);
        assert!(pager.read(no).unwrap_err().is_corruption());
    }

    #[test]
    fn omitted_journal_pins_dirty_pages() {
        let main = InMemoryBackend::new();
        let (mut pager, _) = Pager::open(
            Box::new(main.clone()),
            None,
            options(),
            Arc::new(DatabaseStats::new()),
        )
        .unwrap();
        pager.begin(TransactionId::new(1)).unwrap();
        for i in 0..10 {
            leaf_with(&mut pager, i);
        }
        assert_eq!(main.data().len(), PS);
        pager.rollback().unwrap();
        assert_eq!(pager.page_count(), 1);
    }
}
