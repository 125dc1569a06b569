//! Database statistics.
//!
//! Counters are updated with relaxed atomics by the engine and read through
//! [`crate::Database::stats`] as a [`StatsSnapshot`].
//!
//! # Usage
//!
//! ```rust
//! use quarry_core::Database;
//!
//! let db = Database::open_in_memory().unwrap();
//! db.store(b"k", b"v").unwrap();
//! let stats = db.stats();
//! assert_eq!(stats.writes, 1);
//! assert_eq!(stats.transactions_committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($(#[$doc:meta])* $name:ident => $record:ident;)*) => {
        /// Live database counters.
        ///
        /// All counters are atomic and can be read while operations are in
        /// progress. Values only increase.
        #[derive(Debug, Default)]
        pub struct DatabaseStats {
            $($(#[$doc])* $name: AtomicU64,)*
        }

        impl DatabaseStats {
            /// Creates a new stats instance.
            pub fn new() -> Self {
                Self::default()
            }

            $(
                pub(crate) fn $record(&self) {
                    self.$name.fetch_add(1, Ordering::Relaxed);
                }

                $(#[$doc])*
                pub fn $name(&self) -> u64 {
                    self.$name.load(Ordering::Relaxed)
                }
            )*

            /// Returns a snapshot of all counters.
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($name: self.$name(),)*
                }
            }
        }

        /// A point-in-time copy of [`DatabaseStats`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct StatsSnapshot {
            $($(#[$doc])* pub $name: u64,)*
        }

        impl StatsSnapshot {
            /// Counter names paired with their values, in declaration order.
            #[must_use]
            pub fn fields(&self) -> Vec<(&'static str, u64)> {
                vec![$((stringify!($name), self.$name),)*]
            }
        }
    };
}

counters! {
    /// Point reads (`fetch`, `exists`).
    reads => record_read;
    /// `store` operations.
    writes => record_write;
    /// `append` operations.
    appends => record_append;
    /// `delete` operations that removed a record.
    deletes => record_delete;
    /// Cursor positioning calls (`first`, `last`, `seek`).
    cursor_seeks => record_cursor_seek;
    /// Transactions begun, explicit or implicit.
    transactions_started => record_transaction_start;
    /// Transactions committed.
    transactions_committed => record_transaction_commit;
    /// Transactions rolled back.
    transactions_rolled_back => record_transaction_rollback;
    /// Pages read from the backend.
    page_reads => record_page_read;
    /// Pages written to the backend.
    page_writes => record_page_write;
    /// Page lookups served by the cache.
    cache_hits => record_cache_hit;
    /// Page lookups that went to the backend.
    cache_misses => record_cache_miss;
    /// Times dirty pages were spilled before commit.
    spills => record_spill;
    /// Operations that returned an error.
    errors => record_error;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = DatabaseStats::new();
        assert_eq!(stats.reads(), 0);
        assert_eq!(stats.writes(), 0);
        assert_eq!(stats.transactions_committed(), 0);
    }

    #[test]
    fn record_and_snapshot() {
        let stats = DatabaseStats::new();
        stats.record_read();
        stats.record_read();
        stats.record_write();
        stats.record_transaction_start();
        stats.record_transaction_rollback();

        let snap = stats.snapshot();
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.transactions_started, 1);
        assert_eq!(snap.transactions_rolled_back, 1);
        assert_eq!(snap.fields()[0], ("reads", 2));
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DatabaseStats::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_read();
                    s.record_page_write();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.reads(), 1000);
        assert_eq!(stats.page_writes(), 1000);
    }
}
