//! Journal header and record encoding.

use crate::error::{CoreError, CoreResult};
use crate::types::{PageNo, TransactionId};

/// Magic bytes identifying a journal.
pub const JOURNAL_MAGIC: [u8; 8] = *b"QJOURNAL";

/// Encoded size of [`JournalHeader`].
pub const JOURNAL_HEADER_SIZE: usize = 32;

/// Bytes a record adds around its pre-image: page number and CRC.
pub const RECORD_OVERHEAD: usize = 12;

/// Header written at the start of a journal when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// Page size of the database the journal belongs to.
    pub page_size: usize,
    /// Page count of the database when the transaction began.
    pub original_page_count: u64,
    /// Transaction that owns the journal.
    pub txid: TransactionId,
}

impl JournalHeader {
    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; JOURNAL_HEADER_SIZE] {
        let mut buf = [0u8; JOURNAL_HEADER_SIZE];
        buf[0..8].copy_from_slice(&JOURNAL_MAGIC);
        buf[8..12].copy_from_slice(&(self.page_size as u32).to_le_bytes());
        buf[12..20].copy_from_slice(&self.original_page_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.txid.as_u64().to_le_bytes());
        let crc = crc32fast::hash(&buf[..28]);
        buf[28..32].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a header, returning `None` if the bytes do not hold a complete,
    /// valid header. An invalid header means no page was ever overwritten.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < JOURNAL_HEADER_SIZE || buf[0..8] != JOURNAL_MAGIC {
            return None;
        }
        let stored = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        if stored != crc32fast::hash(&buf[..28]) {
            return None;
        }
        let page_size = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;
        Some(Self {
            page_size,
            original_page_count: read_u64(&buf[12..20]),
            txid: TransactionId::new(read_u64(&buf[20..28])),
        })
    }
}

/// Pre-image of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Page the image belongs to.
    pub page: PageNo,
    /// Page contents before the transaction touched it.
    pub image: Vec<u8>,
}

impl JournalRecord {
    /// Encodes the record: page number, image, CRC over both.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.image.len() + RECORD_OVERHEAD);
        buf.extend_from_slice(&self.page.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.image);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a record of the given page size.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the record is short or its checksum fails.
    pub fn decode(buf: &[u8], page_size: usize) -> CoreResult<Self> {
        let len = page_size + RECORD_OVERHEAD;
        if buf.len() < len {
            return Err(CoreError::corrupt("torn journal record"));
        }
        let body = &buf[..8 + page_size];
        let stored = u32::from_le_bytes([buf[len - 4], buf[len - 3], buf[len - 2], buf[len - 1]]);
        if stored != crc32fast::hash(body) {
            return Err(CoreError::corrupt("journal record checksum mismatch"));
        }
        Ok(Self {
            page: PageNo::new(read_u64(&body[..8])),
            image: body[8..].to_vec(),
        })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(b)
}
