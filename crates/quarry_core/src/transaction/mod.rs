//! Transaction management.
//!
//! A handle runs at most one write transaction at a time. Writes outside an
//! explicit transaction open an implicit one that auto-commit closes after
//! the operation. [`TransactionGuard`] rolls back on drop unless committed.

mod guard;
mod manager;
mod state;

pub use guard::TransactionGuard;
pub use manager::TransactionManager;
pub use state::TransactionState;
