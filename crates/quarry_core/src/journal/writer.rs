//! The rollback journal.

use super::record::{
    JournalHeader, JournalRecord, JOURNAL_HEADER_SIZE, RECORD_OVERHEAD,
};
use crate::error::{CoreError, CoreResult};
use crate::types::{PageNo, TransactionId};
use quarry_storage::StorageBackend;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of replaying a hot journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Transaction that was rolled back.
    pub txid: TransactionId,
    /// Number of page images restored.
    pub pages_restored: usize,
    /// Page count the file was truncated back to.
    pub page_count: u64,
}

/// Rollback journal over a dedicated backend.
///
/// Holds the pre-image of every page below the original page count that the
/// current transaction modified, at most once per page.
pub struct Journal {
    backend: Box<dyn StorageBackend>,
    header: Option<JournalHeader>,
    journaled: HashSet<PageNo>,
}

impl Journal {
    /// Wraps a journal backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            header: None,
            journaled: HashSet::new(),
        }
    }

    /// Starts journaling a transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a transaction is already being journaled.
    pub fn begin(
        &mut self,
        txid: TransactionId,
        page_size: usize,
        original_page_count: u64,
    ) -> CoreResult<()> {
        if self.header.is_some() {
            return Err(CoreError::invalid_state("journal already active"));
        }
        if self.backend.size()? > 0 {
            self.backend.truncate(0)?;
        }
        let header = JournalHeader {
            page_size,
            original_page_count,
            txid,
        };
        self.backend.write_at(0, &header.encode())?;
        self.header = Some(header);
        self.journaled.clear();
        Ok(())
    }

    /// Returns `true` if the page still needs its pre-image recorded.
    pub fn needs(&self, page: PageNo) -> bool {
        match self.header {
            Some(h) => page.as_u64() < h.original_page_count && !self.journaled.contains(&page),
            None => false,
        }
    }

    /// Records a page pre-image. Repeated calls for one page are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be written.
    pub fn record(&mut self, page: PageNo, image: &[u8]) -> CoreResult<()> {
        if !self.needs(page) {
            return Ok(());
        }
        let record = JournalRecord {
            page,
            image: image.to_vec(),
        };
        self.backend.append(&record.encode())?;
        self.journaled.insert(page);
        Ok(())
    }

    /// Forces the journal to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Discards the journal. This is the commit point.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be truncated.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.backend.truncate(0)?;
        self.backend.sync()?;
        self.header = None;
        self.journaled.clear();
        Ok(())
    }

    /// Restores every recorded pre-image into `main`, newest first, and
    /// truncates it back to the original page count.
    ///
    /// # Errors
    ///
    /// Returns an error if `main` cannot be restored; the caller must treat
    /// the store as corrupt.
    pub fn rollback(&mut self, main: &mut dyn StorageBackend) -> CoreResult<usize> {
        let restored = match read_journal(self.backend.as_ref())? {
            Some((header, records)) => restore(main, &header, &records)?,
            None => 0,
        };
        self.commit()?;
        Ok(restored)
    }

    /// Replays a journal left behind by a crashed process.
    ///
    /// Returns `None` if there was nothing to recover. A journal whose header
    /// never became valid is simply cleared.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the journal does not match `expected_page_size`,
    /// or an I/O error if the restore fails.
    pub fn recover(
        &mut self,
        main: &mut dyn StorageBackend,
        expected_page_size: Option<usize>,
    ) -> CoreResult<Option<RecoveryReport>> {
        if self.backend.size()? == 0 {
            return Ok(None);
        }
        let Some((header, records)) = read_journal(self.backend.as_ref())? else {
            debug!("discarding journal without a valid header");
            self.commit()?;
            return Ok(None);
        };
        if let Some(expected) = expected_page_size {
            if expected != header.page_size {
                return Err(CoreError::corrupt(format!(
                    "journal page size {} does not match database page size {expected}",
                    header.page_size
                )));
            }
        }
        let pages_restored = restore(main, &header, &records)?;
        self.commit()?;
        let report = RecoveryReport {
            txid: header.txid,
            pages_restored,
            page_count: header.original_page_count,
        };
        info!(
            txid = %report.txid,
            pages = report.pages_restored,
            page_count = report.page_count,
            "recovered hot journal"
        );
        Ok(Some(report))
    }

    /// Returns `true` if the backend holds a journal that needs replaying.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn is_hot(backend: &dyn StorageBackend) -> CoreResult<bool> {
        if backend.size()? < JOURNAL_HEADER_SIZE as u64 {
            return Ok(false);
        }
        let bytes = backend.read_at(0, JOURNAL_HEADER_SIZE)?;
        Ok(JournalHeader::decode(&bytes).is_some())
    }
}

/// Reads the header and every intact record. Stops at the first torn or
/// damaged record: it was never synced, so its page was never overwritten.
fn read_journal(
    backend: &dyn StorageBackend,
) -> CoreResult<Option<(JournalHeader, Vec<JournalRecord>)>> {
    let size = backend.size()?;
    if size < JOURNAL_HEADER_SIZE as u64 {
        return Ok(None);
    }
    let Some(header) = JournalHeader::decode(&backend.read_at(0, JOURNAL_HEADER_SIZE)?) else {
        return Ok(None);
    };
    let record_len = (header.page_size + RECORD_OVERHEAD) as u64;
    let mut records = Vec::new();
    let mut offset = JOURNAL_HEADER_SIZE as u64;
    while offset + record_len <= size {
        let bytes = backend.read_at(offset, record_len as usize)?;
        match JournalRecord::decode(&bytes, header.page_size) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset, error = %e, "journal ends in a damaged record");
                break;
            }
        }
        offset += record_len;
    }
    Ok(Some((header, records)))
}

fn restore(
    main: &mut dyn StorageBackend,
    header: &JournalHeader,
    records: &[JournalRecord],
) -> CoreResult<usize> {
    for record in records.iter().rev() {
        main.write_at(record.page.offset(header.page_size), &record.image)?;
    }
    let target = header.original_page_count * header.page_size as u64;
    if main.size()? > target {
        main.truncate(target)?;
    }
    main.sync()?;
    Ok(records.len())
}
