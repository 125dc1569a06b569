//! B+tree key/value engine.
//!
//! Keys are unique byte strings ordered by unsigned byte-wise comparison.
//! Records live only in leaves, which are doubly linked in key order so a
//! cursor can step to the next or previous record without revisiting the
//! interior. Values too large for a leaf cell are moved to overflow chains.
//!
//! All functions operate on a [`Pager`](crate::pager::Pager) that has an open
//! transaction whenever they modify the tree.

mod node;
mod ops;
mod overflow;
mod verify;

pub use node::{max_key_len, CellValue, InternalNode, LeafCell, LeafNode, Node};
pub use ops::{
    contains, find_leaf, first_leaf, get, last_leaf, load_leaf, put, read_value, remove,
    validate_key, WriteMode,
};
pub use verify::{verify, VerifyReport};
