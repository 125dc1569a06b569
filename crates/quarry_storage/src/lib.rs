//! # QuarryDB Storage
//!
//! Storage backend trait and implementations for QuarryDB.
//!
//! This crate provides the lowest-level storage abstraction for QuarryDB.
//! Storage backends are **opaque byte stores** - they do not interpret
//! the data they store. The pager in `quarry_core` lays fixed-size pages
//! over them; the journal uses a second backend for page pre-images.
//!
//! ## Design Principles
//!
//! - Backends are simple random-access byte stores (read, write, append, flush)
//! - No knowledge of QuarryDB page formats, journals, or B-trees
//! - Must be `Send + Sync` for concurrent access
//! - QuarryDB owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use quarry_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
