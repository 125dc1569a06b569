//! Storage manager: fixed-size pages over a [`quarry_storage::StorageBackend`].
//!
//! Page 0 holds the [`Header`]. Every other page carries the common page
//! header described in [`page`] and is either a B+tree node, an overflow
//! chain link or a free-list trunk.

mod cache;
mod freelist;
mod header;
mod manager;
pub mod page;

pub use freelist::trunk_capacity;
pub use header::{Header, FORMAT_MAJOR, FORMAT_MINOR, MAGIC};
pub use manager::{Pager, PagerOptions};
pub use page::{Page, PageType, PAGE_HEADER_SIZE};
