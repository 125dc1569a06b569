//! Core type definitions for QuarryDB.

use std::fmt;

/// Number of a page in the database file.
///
/// Page 0 is the header page, so `PageNo(0)` doubles as the null pointer in
/// on-disk links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageNo(pub u64);

impl PageNo {
    /// The header page, also used as "no page".
    pub const NONE: PageNo = PageNo(0);

    /// Creates a new page number.
    #[must_use]
    pub const fn new(no: u64) -> Self {
        Self(no)
    }

    /// Returns the raw page number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null pointer.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Byte offset of this page in a file with the given page size.
    #[must_use]
    pub const fn offset(self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }
}

impl fmt::Display for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}", self.0)
    }
}

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing within a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_no_offsets() {
        assert_eq!(PageNo::new(3).offset(4096), 3 * 4096);
        assert!(PageNo::NONE.is_none());
        assert!(!PageNo::new(1).is_none());
        assert_eq!(PageNo::new(7).to_string(), "page:7");
    }

    #[test]
    fn transaction_id_display() {
        assert_eq!(TransactionId::new(42).to_string(), "txn:42");
        assert!(TransactionId::new(1) < TransactionId::new(2));
    }
}
