//! B+tree search, insert and delete.

use super::node::{
    fits_inline, max_key_len, CellValue, InternalNode, LeafCell, LeafNode, Node,
};
use super::overflow::{free_chain, read_chain, write_chain};
use crate::error::{CoreError, CoreResult};
use crate::pager::Pager;
use crate::types::PageNo;

/// How `put` treats an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace it.
    Store,
    /// Concatenate the new bytes onto it.
    Append,
}

/// Result of inserting into a subtree. A split hands the separator and the
/// new right sibling to the parent.
struct Inserted {
    split: Option<(Vec<u8>, PageNo)>,
    added: bool,
}

enum Deleted {
    Missing,
    Kept,
    Emptied,
}

/// Rejects keys the tree cannot hold.
///
/// # Errors
///
/// `InvalidArgument` for an empty key, `KeyTooLarge` past the page limit.
pub fn validate_key(page_size: usize, key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("key must not be empty"));
    }
    let max = max_key_len(page_size);
    if key.len() > max {
        return Err(CoreError::KeyTooLarge {
            len: key.len(),
            max,
        });
    }
    Ok(())
}

/// Looks a key up.
pub fn get(pager: &mut Pager, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
    let Some(leaf) = find_leaf(pager, key)? else {
        return Ok(None);
    };
    match leaf.search(key) {
        Ok(slot) => read_value(pager, &leaf.cells[slot].value).map(Some),
        Err(_) => Ok(None),
    }
}

/// Returns `true` if the key is present, without reading overflow chains.
pub fn contains(pager: &mut Pager, key: &[u8]) -> CoreResult<bool> {
    Ok(find_leaf(pager, key)?.is_some_and(|leaf| leaf.search(key).is_ok()))
}

/// Inserts or updates a record. Returns `true` if the key was new.
pub fn put(pager: &mut Pager, key: &[u8], value: &[u8], mode: WriteMode) -> CoreResult<bool> {
    validate_key(pager.page_size(), key)?;
    let page_size = pager.page_size();
    let root = pager.root();

    if root.is_none() {
        let mut leaf = LeafNode::new(pager.allocate_page()?);
        let value = make_value(pager, key, value)?;
        leaf.cells.push(LeafCell {
            key: key.to_vec(),
            value,
        });
        pager.write(leaf.to_page(page_size))?;
        pager.set_root(leaf.no);
        pager.adjust_record_count(1);
        return Ok(true);
    }

    let inserted = insert_into(pager, root, key, value, mode)?;
    if let Some((separator, right)) = inserted.split {
        let node = InternalNode {
            no: pager.allocate_page()?,
            keys: vec![separator],
            children: vec![root, right],
        };
        pager.write(node.to_page(page_size))?;
        pager.set_root(node.no);
    }
    if inserted.added {
        pager.adjust_record_count(1);
    }
    Ok(inserted.added)
}

/// Deletes a record. Returns `true` if it existed.
pub fn remove(pager: &mut Pager, key: &[u8]) -> CoreResult<bool> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("key must not be empty"));
    }
    let root = pager.root();
    if root.is_none() || key.len() > max_key_len(pager.page_size()) {
        return Ok(false);
    }
    match delete_from(pager, root, key, true)? {
        Deleted::Missing => Ok(false),
        Deleted::Kept | Deleted::Emptied => {
            pager.adjust_record_count(-1);
            collapse_root(pager)?;
            Ok(true)
        }
    }
}

/// Materialises a cell value.
pub fn read_value(pager: &mut Pager, value: &CellValue) -> CoreResult<Vec<u8>> {
    match value {
        CellValue::Inline(bytes) => Ok(bytes.clone()),
        CellValue::Overflow { len, first } => read_chain(pager, *first, *len),
    }
}

/// Loads and decodes a leaf.
pub fn load_leaf(pager: &mut Pager, no: PageNo) -> CoreResult<LeafNode> {
    let page = pager.read(no)?;
    LeafNode::from_page(&page)
}

/// The leaf whose key range contains `key`.
pub fn find_leaf(pager: &mut Pager, key: &[u8]) -> CoreResult<Option<LeafNode>> {
    descend(pager, |node| node.child_index(key))
}

/// The leftmost leaf.
pub fn first_leaf(pager: &mut Pager) -> CoreResult<Option<LeafNode>> {
    descend(pager, |_| 0)
}

/// The rightmost leaf.
pub fn last_leaf(pager: &mut Pager) -> CoreResult<Option<LeafNode>> {
    descend(pager, |node| node.children.len() - 1)
}

fn descend(
    pager: &mut Pager,
    pick: impl Fn(&InternalNode) -> usize,
) -> CoreResult<Option<LeafNode>> {
    let mut no = pager.root();
    if no.is_none() {
        return Ok(None);
    }
    // bounded so a cyclic tree cannot hang the caller
    for _ in 0..=pager.page_count() {
        let page = pager.read(no)?;
        match Node::from_page(&page)? {
            Node::Leaf(leaf) => return Ok(Some(leaf)),
            Node::Internal(node) => no = node.children[pick(&node)],
        }
    }
    Err(CoreError::corrupt("tree descent does not terminate"))
}

fn make_value(pager: &mut Pager, key: &[u8], value: &[u8]) -> CoreResult<CellValue> {
    if fits_inline(pager.page_size(), key.len(), value.len()) {
        Ok(CellValue::Inline(value.to_vec()))
    } else {
        let first = write_chain(pager, value)?;
        Ok(CellValue::Overflow {
            len: value.len() as u64,
            first,
        })
    }
}

fn release_value(pager: &mut Pager, value: &CellValue) -> CoreResult<()> {
    match value {
        CellValue::Inline(_) => Ok(()),
        CellValue::Overflow { first, .. } => free_chain(pager, *first),
    }
}

fn insert_into(
    pager: &mut Pager,
    no: PageNo,
    key: &[u8],
    value: &[u8],
    mode: WriteMode,
) -> CoreResult<Inserted> {
    let page_size = pager.page_size();
    let page = pager.read(no)?;
    match Node::from_page(&page)? {
        Node::Leaf(mut leaf) => {
            let added = match leaf.search(key) {
                Ok(slot) => {
                    let old = leaf.cells[slot].value.clone();
                    let combined;
                    let new_value = match mode {
                        WriteMode::Store => value,
                        WriteMode::Append => {
                            let mut bytes = read_value(pager, &old)?;
                            bytes.extend_from_slice(value);
                            combined = bytes;
                            combined.as_slice()
                        }
                    };
                    release_value(pager, &old)?;
                    leaf.cells[slot].value = make_value(pager, key, new_value)?;
                    false
                }
                Err(at) => {
                    let value = make_value(pager, key, value)?;
                    leaf.cells.insert(
                        at,
                        LeafCell {
                            key: key.to_vec(),
                            value,
                        },
                    );
                    true
                }
            };
            let split = split_leaf(pager, &mut leaf)?;
            pager.write(leaf.to_page(page_size))?;
            Ok(Inserted { split, added })
        }
        Node::Internal(mut node) => {
            let idx = node.child_index(key);
            let inserted = insert_into(pager, node.children[idx], key, value, mode)?;
            let Some((separator, right)) = inserted.split else {
                return Ok(inserted);
            };
            node.keys.insert(idx, separator);
            node.children.insert(idx + 1, right);
            let split = split_internal(pager, &mut node)?;
            pager.write(node.to_page(page_size))?;
            Ok(Inserted {
                split,
                added: inserted.added,
            })
        }
    }
}

/// Index splitting `sizes` into two halves of roughly equal bytes, keeping
/// at least `min` items on each side.
fn split_point(sizes: impl Iterator<Item = usize>, total: usize, len: usize, min: usize) -> usize {
    let mut acc = 0;
    let mut mid = len - min;
    for (i, size) in sizes.enumerate() {
        acc += size;
        if acc >= total / 2 {
            mid = i + 1;
            break;
        }
    }
    mid.clamp(min, len - min)
}

fn split_leaf(pager: &mut Pager, leaf: &mut LeafNode) -> CoreResult<Option<(Vec<u8>, PageNo)>> {
    let page_size = pager.page_size();
    if leaf.encoded_len() <= page_size {
        return Ok(None);
    }
    let sizes = leaf.cells.iter().map(LeafCell::encoded_len);
    let total: usize = sizes.clone().sum();
    let mid = split_point(sizes, total, leaf.cells.len(), 1);

    let right = LeafNode {
        no: pager.allocate_page()?,
        cells: leaf.cells.split_off(mid),
        next: leaf.next,
        prev: leaf.no,
    };
    if !leaf.next.is_none() {
        let mut next = load_leaf(pager, leaf.next)?;
        next.prev = right.no;
        pager.write(next.to_page(page_size))?;
    }
    leaf.next = right.no;
    pager.write(right.to_page(page_size))?;
    Ok(Some((right.cells[0].key.clone(), right.no)))
}

fn split_internal(
    pager: &mut Pager,
    node: &mut InternalNode,
) -> CoreResult<Option<(Vec<u8>, PageNo)>> {
    let page_size = pager.page_size();
    if node.encoded_len() <= page_size {
        return Ok(None);
    }
    let sizes = node.keys.iter().map(|k| k.len() + 10);
    let total: usize = sizes.clone().sum();
    // the key at `mid` moves up, so each side keeps at least one key
    let mid = split_point(sizes, total, node.keys.len(), 1).min(node.keys.len() - 2);

    let right_keys = node.keys.split_off(mid + 1);
    let separator = node
        .keys
        .pop()
        .ok_or_else(|| CoreError::corrupt("internal split without a separator"))?;
    let right = InternalNode {
        no: pager.allocate_page()?,
        keys: right_keys,
        children: node.children.split_off(mid + 1),
    };
    pager.write(right.to_page(page_size))?;
    Ok(Some((separator, right.no)))
}

fn delete_from(pager: &mut Pager, no: PageNo, key: &[u8], is_root: bool) -> CoreResult<Deleted> {
    let page_size = pager.page_size();
    let page = pager.read(no)?;
    match Node::from_page(&page)? {
        Node::Leaf(mut leaf) => {
            let Ok(slot) = leaf.search(key) else {
                return Ok(Deleted::Missing);
            };
            let cell = leaf.cells.remove(slot);
            release_value(pager, &cell.value)?;
            if leaf.cells.is_empty() && !is_root {
                unlink_leaf(pager, &leaf)?;
                pager.free_page(no)?;
                return Ok(Deleted::Emptied);
            }
            pager.write(leaf.to_page(page_size))?;
            Ok(Deleted::Kept)
        }
        Node::Internal(mut node) => {
            let idx = node.child_index(key);
            match delete_from(pager, node.children[idx], key, false)? {
                Deleted::Emptied => {
                    node.children.remove(idx);
                    if !node.keys.is_empty() {
                        node.keys.remove(idx.min(node.keys.len() - 1));
                    }
                    if node.children.is_empty() && !is_root {
                        pager.free_page(no)?;
                        return Ok(Deleted::Emptied);
                    }
                    pager.write(node.to_page(page_size))?;
                    Ok(Deleted::Kept)
                }
                other => Ok(other),
            }
        }
    }
}

fn unlink_leaf(pager: &mut Pager, leaf: &LeafNode) -> CoreResult<()> {
    let page_size = pager.page_size();
    if !leaf.prev.is_none() {
        let mut prev = load_leaf(pager, leaf.prev)?;
        prev.next = leaf.next;
        pager.write(prev.to_page(page_size))?;
    }
    if !leaf.next.is_none() {
        let mut next = load_leaf(pager, leaf.next)?;
        next.prev = leaf.prev;
        pager.write(next.to_page(page_size))?;
    }
    Ok(())
}

/// Shrinks the tree after deletes: an internal root without separators is
/// replaced by its only child, an empty root leaf empties the tree.
fn collapse_root(pager: &mut Pager) -> CoreResult<()> {
    loop {
        let root = pager.root();
        if root.is_none() {
            return Ok(());
        }
        let page = pager.read(root)?;
        match Node::from_page(&page)? {
            Node::Internal(node) if node.keys.is_empty() => {
                let child = node.children.first().copied().unwrap_or(PageNo::NONE);
                pager.free_page(root)?;
                pager.set_root(child);
            }
            Node::Leaf(leaf) if leaf.cells.is_empty() => {
                pager.free_page(root)?;
                pager.set_root(PageNo::NONE);
                return Ok(());
            }
            _ => return Ok(()),
        }
    }
}
