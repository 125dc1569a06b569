//! # QuarryDB Testkit
//!
//! Test utilities for QuarryDB.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - Storage fault injection and crash simulation
//!
//! ## Usage
//!
//! ```rust
//! use quarry_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     db.store(b"k", b"v").unwrap();
//!     assert!(db.exists(b"k").unwrap());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
