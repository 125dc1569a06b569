//! Transaction state.

use std::fmt;

/// Lifecycle of the handle's write transaction.
///
/// `Committed` and `RolledBack` describe how the last transaction ended; a new
/// one may begin from either, or from `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No transaction has run yet.
    #[default]
    Inactive,
    /// A transaction is open.
    Active,
    /// Commit is writing pages.
    Committing,
    /// The last transaction committed.
    Committed,
    /// The last transaction rolled back.
    RolledBack,
}

impl TransactionState {
    /// Returns `true` while a transaction is open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Committing)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}
