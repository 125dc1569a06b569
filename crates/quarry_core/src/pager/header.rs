//! File header stored in page 0.
//!
//! ```text
//! [0..8]    magic "QUARRYKV"
//! [8..10]   format major version
//! [10..12]  format minor version
//! [12..16]  page size
//! [16..24]  page count
//! [24..32]  free-list head trunk
//! [32..40]  free page count
//! [40..48]  B+tree root page (0 = empty tree)
//! [48..56]  record count
//! [56..64]  commit counter
//! [64..80]  engine name, zero padded
//! [80..84]  CRC-32 of bytes 0..80
//! ```

use crate::config::is_valid_page_size;
use crate::error::{CoreError, CoreResult};
use crate::types::PageNo;

/// Magic bytes at the start of every database file.
pub const MAGIC: [u8; 8] = *b"QUARRYKV";
/// Current format major version. Files with a newer major are rejected.
pub const FORMAT_MAJOR: u16 = 1;
/// Current format minor version.
pub const FORMAT_MINOR: u16 = 0;
/// Bytes of page 0 covered by the header.
pub const HEADER_LEN: usize = 84;

const ENGINE_FIELD: std::ops::Range<usize> = 64..80;

/// Decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version of the file.
    pub version: (u16, u16),
    /// Page size in bytes.
    pub page_size: usize,
    /// Number of pages in the file, header included.
    pub page_count: u64,
    /// First free-list trunk page.
    pub freelist_head: PageNo,
    /// Number of free pages, trunks included.
    pub free_count: u64,
    /// Root of the B+tree.
    pub root: PageNo,
    /// Number of records in the tree.
    pub record_count: u64,
    /// Number of commits since creation.
    pub commit_counter: u64,
    /// Key/value engine name.
    pub engine: String,
}

impl Header {
    /// Header for a freshly created file.
    #[must_use]
    pub fn new(page_size: usize, engine: &str) -> Self {
        Self {
            version: (FORMAT_MAJOR, FORMAT_MINOR),
            page_size,
            page_count: 1,
            freelist_head: PageNo::NONE,
            free_count: 0,
            root: PageNo::NONE,
            record_count: 0,
            commit_counter: 0,
            engine: engine.to_string(),
        }
    }

    /// Serializes the header into a full page image.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.page_size];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..10].copy_from_slice(&self.version.0.to_le_bytes());
        buf[10..12].copy_from_slice(&self.version.1.to_le_bytes());
        buf[12..16].copy_from_slice(&(self.page_size as u32).to_le_bytes());
        buf[16..24].copy_from_slice(&self.page_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.freelist_head.as_u64().to_le_bytes());
        buf[32..40].copy_from_slice(&self.free_count.to_le_bytes());
        buf[40..48].copy_from_slice(&self.root.as_u64().to_le_bytes());
        buf[48..56].copy_from_slice(&self.record_count.to_le_bytes());
        buf[56..64].copy_from_slice(&self.commit_counter.to_le_bytes());
        let name = self.engine.as_bytes();
        let len = name.len().min(ENGINE_FIELD.len());
        buf[ENGINE_FIELD.start..ENGINE_FIELD.start + len].copy_from_slice(&name[..len]);
        let crc = crc32fast::hash(&buf[..80]);
        buf[80..84].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Parses and validates a header from the first bytes of a file.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` for a foreign file, a newer major version or an
    ///   invalid page size
    /// - `Corrupt` for a checksum mismatch
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CoreError::unsupported_format("file too short for a header"));
        }
        if buf[0..8] != MAGIC {
            return Err(CoreError::unsupported_format("not a QuarryDB file"));
        }
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(b)
        };
        let major = u16_at(8);
        let minor = u16_at(10);
        if major > FORMAT_MAJOR {
            return Err(CoreError::unsupported_format(format!(
                "format version {major}.{minor} is newer than {FORMAT_MAJOR}.{FORMAT_MINOR}"
            )));
        }
        let stored_crc = u32::from_le_bytes([buf[80], buf[81], buf[82], buf[83]]);
        let actual_crc = crc32fast::hash(&buf[..80]);
        if stored_crc != actual_crc {
            return Err(CoreError::corrupt(format!(
                "header checksum mismatch: stored {stored_crc:08x}, computed {actual_crc:08x}"
            )));
        }
        let page_size = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]) as usize;
        if !is_valid_page_size(page_size) {
            return Err(CoreError::unsupported_format(format!(
                "invalid page size {page_size}"
            )));
        }
        let engine_bytes = &buf[ENGINE_FIELD];
        let end = engine_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(engine_bytes.len());
        let engine = String::from_utf8_lossy(&engine_bytes[..end]).into_owned();

        let header = Self {
            version: (major, minor),
            page_size,
            page_count: u64_at(16),
            freelist_head: PageNo::new(u64_at(24)),
            free_count: u64_at(32),
            root: PageNo::new(u64_at(40)),
            record_count: u64_at(48),
            commit_counter: u64_at(56),
            engine,
        };
        if header.page_count == 0 {
            return Err(CoreError::corrupt("header reports zero pages"));
        }
        Ok(header)
    }
}
