//! Single-writer transaction bookkeeping.

use super::state::TransactionState;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use std::thread::ThreadId;

/// Tracks the one write transaction a handle may have open.
///
/// The manager records who owns the transaction and whether it was opened
/// implicitly by a write; the pager does the actual page work.
#[derive(Debug)]
pub struct TransactionManager {
    state: TransactionState,
    owner: Option<ThreadId>,
    implicit: bool,
    current: Option<TransactionId>,
    next_txid: u64,
}

impl TransactionManager {
    /// Creates a manager with no transaction.
    pub fn new() -> Self {
        Self {
            state: TransactionState::Inactive,
            owner: None,
            implicit: false,
            current: None,
            next_txid: 1,
        }
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns `true` while a transaction is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Thread that owns the open transaction.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    /// Returns `true` if another thread owns the open transaction.
    pub fn held_by_other(&self, me: ThreadId) -> bool {
        self.owner.is_some_and(|owner| owner != me)
    }

    /// Returns `true` if the open transaction was started by a write.
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// Identifier of the open transaction.
    pub fn current(&self) -> Option<TransactionId> {
        self.current
    }

    /// Opens a transaction owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyActive` if one is already open.
    pub fn begin(&mut self, owner: ThreadId, implicit: bool) -> CoreResult<TransactionId> {
        if self.is_open() {
            return Err(CoreError::AlreadyActive);
        }
        let txid = TransactionId::new(self.next_txid);
        self.next_txid += 1;
        self.state = TransactionState::Active;
        self.owner = Some(owner);
        self.implicit = implicit;
        self.current = Some(txid);
        Ok(txid)
    }

    /// Turns an implicit transaction into an explicit one.
    pub fn make_explicit(&mut self) {
        self.implicit = false;
    }

    /// Enters the commit phase.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no transaction is active.
    pub fn start_commit(&mut self) -> CoreResult<TransactionId> {
        match (self.state, self.current) {
            (TransactionState::Active, Some(txid)) => {
                self.state = TransactionState::Committing;
                Ok(txid)
            }
            _ => Err(CoreError::invalid_state("no active transaction to commit")),
        }
    }

    /// Returns to `Active` after a failed commit.
    pub fn abort_commit(&mut self) {
        if self.state == TransactionState::Committing {
            self.state = TransactionState::Active;
        }
    }

    /// Records a successful commit.
    pub fn finish_commit(&mut self) {
        self.end(TransactionState::Committed);
    }

    /// Records a rollback.
    pub fn finish_rollback(&mut self) {
        self.end(TransactionState::RolledBack);
    }

    fn end(&mut self, state: TransactionState) {
        self.state = state;
        self.owner = None;
        self.implicit = false;
        self.current = None;
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
