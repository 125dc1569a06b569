//! Scoped transaction.

use crate::database::Database;
use crate::error::CoreResult;
use tracing::warn;

/// An explicit transaction that rolls back when dropped uncommitted.
///
/// Obtained from [`Database::transaction`]. Writes go through the database
/// handle as usual; the guard only decides how the transaction ends.
///
/// ```rust
/// use quarry_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// {
///     let _txn = db.transaction().unwrap();
///     db.store(b"draft", b"1").unwrap();
/// } // dropped: rolled back
/// assert_eq!(db.fetch(b"draft").unwrap(), None);
/// ```
#[must_use = "dropping the guard rolls the transaction back"]
pub struct TransactionGuard<'db> {
    db: &'db Database,
    done: bool,
}

impl<'db> TransactionGuard<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self { db, done: false }
    }

    /// Commits the transaction.
    ///
    /// If the commit fails the guard still rolls back when dropped.
    ///
    /// # Errors
    ///
    /// The error that stopped the commit.
    pub fn commit(mut self) -> CoreResult<()> {
        self.db.commit()?;
        self.done = true;
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Fails if the restore fails; the store is then marked corrupt.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.done = true;
        self.db.rollback()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = self.db.rollback() {
                warn!(error = %err, "rollback of abandoned transaction failed");
            }
        }
    }
}
