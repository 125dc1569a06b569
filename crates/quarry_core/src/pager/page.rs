//! Raw page buffers and the common page header.
//!
//! Every page except the file header starts with:
//!
//! ```text
//! [0]      page type
//! [1..4]   reserved
//! [4..8]   CRC-32 of the page with this field zeroed
//! [8..16]  page number (guards against misdirected writes)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::PageNo;

/// Size of the common page header.
pub const PAGE_HEADER_SIZE: usize = 16;

const CRC_RANGE: std::ops::Range<usize> = 4..8;

/// Kind of content stored in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    /// B+tree leaf.
    Leaf = 1,
    /// B+tree internal node.
    Internal = 2,
    /// Overflow chain link.
    Overflow = 3,
    /// Free-list trunk.
    FreeTrunk = 4,
}

impl PageType {
    /// Converts a byte to a page type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Leaf),
            2 => Some(Self::Internal),
            3 => Some(Self::Overflow),
            4 => Some(Self::FreeTrunk),
            _ => None,
        }
    }
}

/// An owned page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    no: PageNo,
    data: Vec<u8>,
}

impl Page {
    /// Creates a zeroed page of the given type.
    #[must_use]
    pub fn new(no: PageNo, page_size: usize, page_type: PageType) -> Self {
        let mut data = vec![0u8; page_size];
        data[0] = page_type as u8;
        data[8..16].copy_from_slice(&no.as_u64().to_le_bytes());
        Self { no, data }
    }

    /// Wraps bytes read from storage, verifying checksum and page number.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` or `Corrupt` if the image is damaged.
    pub fn from_disk(no: PageNo, data: Vec<u8>) -> CoreResult<Self> {
        let stored = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let actual = checksum(&data);
        if stored != actual {
            return Err(CoreError::ChecksumMismatch {
                page: no.as_u64(),
                expected: stored,
                actual,
            });
        }
        let page = Self { no, data };
        if page.read_u64(8) != no.as_u64() {
            return Err(CoreError::corrupt(format!(
                "{no} carries page number {}",
                page.read_u64(8)
            )));
        }
        Ok(page)
    }

    /// Page number.
    #[must_use]
    pub fn no(&self) -> PageNo {
        self.no
    }

    /// Page type, if the type byte is valid.
    #[must_use]
    pub fn page_type(&self) -> Option<PageType> {
        PageType::from_byte(self.data[0])
    }

    /// Fails unless the page has the expected type.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` on mismatch.
    pub fn expect_type(&self, expected: PageType) -> CoreResult<()> {
        match self.page_type() {
            Some(t) if t == expected => Ok(()),
            other => Err(CoreError::corrupt(format!(
                "{} has type {other:?}, expected {expected:?}",
                self.no
            ))),
        }
    }

    /// Raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Image to write to storage, with page number and checksum stamped.
    #[must_use]
    pub fn to_disk(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        data[8..16].copy_from_slice(&self.no.as_u64().to_le_bytes());
        let crc = checksum(&data);
        data[CRC_RANGE].copy_from_slice(&crc.to_le_bytes());
        data
    }

    /// Reads a little-endian `u16`.
    #[must_use]
    pub fn read_u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    /// Reads a little-endian `u32`.
    #[must_use]
    pub fn read_u32(&self, at: usize) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.data[at..at + 4]);
        u32::from_le_bytes(b)
    }

    /// Reads a little-endian `u64`.
    #[must_use]
    pub fn read_u64(&self, at: usize) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.data[at..at + 8]);
        u64::from_le_bytes(b)
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, at: usize, v: u16) {
        self.data[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, at: usize, v: u32) {
        self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, at: usize, v: u64) {
        self.data[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }
}

/// CRC-32 over a page image, skipping the checksum field.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[..CRC_RANGE.start]);
    hasher.update(&[0u8; 4]);
    hasher.update(&data[CRC_RANGE.end..]);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_page_round_trips() {
        let mut page = Page::new(PageNo::new(5), 512, PageType::Leaf);
        page.write_u32(100, 0xdead_beef);
        let bytes = page.to_disk();

        let loaded = Page::from_disk(PageNo::new(5), bytes).unwrap();
        assert_eq!(loaded.page_type(), Some(PageType::Leaf));
        assert_eq!(loaded.read_u32(100), 0xdead_beef);
    }

    #[test]
    fn flipped_bit_is_detected() {
        let mut bytes = Page::new(PageNo::new(2), 512, PageType::Internal).to_disk();
        bytes[300] ^= 0x01;
        assert!(matches!(
            Page::from_disk(PageNo::new(2), bytes),
            Err(CoreError::ChecksumMismatch { page: 2, .. })
        ));
    }

    #[test]
    fn misdirected_page_is_detected() {
        let bytes = Page::new(PageNo::new(2), 512, PageType::Leaf).to_disk();
        let err = Page::from_disk(PageNo::new(3), bytes).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn expect_type_checks() {
        let page = Page::new(PageNo::new(1), 512, PageType::Overflow);
        assert!(page.expect_type(PageType::Overflow).is_ok());
        assert!(page.expect_type(PageType::Leaf).unwrap_err().is_corruption());
    }
}
