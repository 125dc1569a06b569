//! B+tree node encoding.
//!
//! ```text
//! leaf:      [16..18] cell count  [18..26] next leaf  [26..34] previous leaf
//!            cells: key len u16 | key | 0 | value len u32 | value
//!                   key len u16 | key | 1 | total len u64 | first overflow page u64
//!
//! internal:  [16..18] key count   [18..26] rightmost child  [26..34] reserved
//!            cells: key len u16 | key | child u64
//! ```
//!
//! In an internal node, child `i` holds keys below separator `i` and at or
//! above separator `i - 1`; the rightmost child holds keys at or above the
//! last separator.

use crate::error::{CoreError, CoreResult};
use crate::pager::{Page, PageType, PAGE_HEADER_SIZE};
use crate::types::PageNo;

const COUNT: usize = PAGE_HEADER_SIZE;
const LINK_A: usize = PAGE_HEADER_SIZE + 2;
const LINK_B: usize = PAGE_HEADER_SIZE + 10;
/// Offset of the first cell in a node page.
pub const BODY: usize = PAGE_HEADER_SIZE + 18;

const INLINE: u8 = 0;
const OVERFLOW: u8 = 1;

/// Largest cell a node may hold. At least four cells fit in every node, so a
/// split always produces two valid halves.
#[must_use]
pub fn max_cell_size(page_size: usize) -> usize {
    (page_size - BODY) / 4
}

/// Largest accepted key.
#[must_use]
pub fn max_key_len(page_size: usize) -> usize {
    max_cell_size(page_size) - 19
}

/// Returns `true` if a value of `value_len` bytes is stored in the leaf.
#[must_use]
pub fn fits_inline(page_size: usize, key_len: usize, value_len: usize) -> bool {
    7 + key_len + value_len <= max_cell_size(page_size)
}

/// Where a value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Stored in the leaf cell.
    Inline(Vec<u8>),
    /// Stored in an overflow chain.
    Overflow {
        /// Total value length.
        len: u64,
        /// First page of the chain.
        first: PageNo,
    },
}

impl CellValue {
    /// Length of the value in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Inline(v) => v.len() as u64,
            Self::Overflow { len, .. } => *len,
        }
    }

    /// Returns `true` for an empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Inline(v) => 1 + 4 + v.len(),
            Self::Overflow { .. } => 1 + 16,
        }
    }
}

/// One key/value entry of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell {
    /// The key.
    pub key: Vec<u8>,
    /// The value or a pointer to it.
    pub value: CellValue,
}

impl LeafCell {
    /// Encoded size of the cell.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        2 + self.key.len() + self.value.encoded_len()
    }
}

/// Decoded leaf page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    /// Page the leaf lives in.
    pub no: PageNo,
    /// Cells in key order.
    pub cells: Vec<LeafCell>,
    /// Next leaf in key order.
    pub next: PageNo,
    /// Previous leaf in key order.
    pub prev: PageNo,
}

impl LeafNode {
    /// Creates an empty leaf.
    #[must_use]
    pub fn new(no: PageNo) -> Self {
        Self {
            no,
            cells: Vec::new(),
            next: PageNo::NONE,
            prev: PageNo::NONE,
        }
    }

    /// Binary search for `key`: `Ok(slot)` if present, `Err(insert_at)` if not.
    pub fn search(&self, key: &[u8]) -> Result<usize, usize> {
        self.cells.binary_search_by(|c| c.key.as_slice().cmp(key))
    }

    /// Encoded size of the node.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        BODY + self.cells.iter().map(LeafCell::encoded_len).sum::<usize>()
    }

    /// Encodes the leaf into a page.
    #[must_use]
    pub fn to_page(&self, page_size: usize) -> Page {
        let mut page = Page::new(self.no, page_size, PageType::Leaf);
        page.write_u16(COUNT, self.cells.len() as u16);
        page.write_u64(LINK_A, self.next.as_u64());
        page.write_u64(LINK_B, self.prev.as_u64());
        let mut at = BODY;
        let data = page.data_mut();
        for cell in &self.cells {
            at = put_key(data, at, &cell.key);
            match &cell.value {
                CellValue::Inline(v) => {
                    data[at] = INLINE;
                    data[at + 1..at + 5].copy_from_slice(&(v.len() as u32).to_le_bytes());
                    data[at + 5..at + 5 + v.len()].copy_from_slice(v);
                    at += 5 + v.len();
                }
                CellValue::Overflow { len, first } => {
                    data[at] = OVERFLOW;
                    data[at + 1..at + 9].copy_from_slice(&len.to_le_bytes());
                    data[at + 9..at + 17].copy_from_slice(&first.as_u64().to_le_bytes());
                    at += 17;
                }
            }
        }
        page
    }

    /// Decodes a leaf page.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the page is not a well-formed leaf.
    pub fn from_page(page: &Page) -> CoreResult<Self> {
        page.expect_type(PageType::Leaf)?;
        let count = page.read_u16(COUNT) as usize;
        let data = page.data();
        let mut reader = Reader::new(data, BODY, page.no());
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            let key = reader.key()?;
            let value = match reader.byte()? {
                INLINE => {
                    let len = reader.u32()? as usize;
                    CellValue::Inline(reader.bytes(len)?.to_vec())
                }
                OVERFLOW => CellValue::Overflow {
                    len: reader.u64()?,
                    first: PageNo::new(reader.u64()?),
                },
                other => {
                    return Err(CoreError::corrupt(format!(
                        "{} has value flag {other}",
                        page.no()
                    )))
                }
            };
            cells.push(LeafCell { key, value });
        }
        Ok(Self {
            no: page.no(),
            cells,
            next: PageNo::new(page.read_u64(LINK_A)),
            prev: PageNo::new(page.read_u64(LINK_B)),
        })
    }
}

/// Decoded internal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// Page the node lives in.
    pub no: PageNo,
    /// Separator keys.
    pub keys: Vec<Vec<u8>>,
    /// Children; always one more than `keys`, the last being the rightmost.
    pub children: Vec<PageNo>,
}

impl InternalNode {
    /// Index of the child whose range contains `key`.
    #[must_use]
    pub fn child_index(&self, key: &[u8]) -> usize {
        self.keys.partition_point(|k| k.as_slice() <= key)
    }

    /// Encoded size of the node.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        BODY + self.keys.iter().map(|k| 2 + k.len() + 8).sum::<usize>()
    }

    /// Encodes the node into a page.
    #[must_use]
    pub fn to_page(&self, page_size: usize) -> Page {
        let mut page = Page::new(self.no, page_size, PageType::Internal);
        page.write_u16(COUNT, self.keys.len() as u16);
        let rightmost = self.children.last().copied().unwrap_or(PageNo::NONE);
        page.write_u64(LINK_A, rightmost.as_u64());
        let mut at = BODY;
        let data = page.data_mut();
        for (key, child) in self.keys.iter().zip(&self.children) {
            at = put_key(data, at, key);
            data[at..at + 8].copy_from_slice(&child.as_u64().to_le_bytes());
            at += 8;
        }
        page
    }

    /// Decodes an internal page.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the page is not a well-formed internal node.
    pub fn from_page(page: &Page) -> CoreResult<Self> {
        page.expect_type(PageType::Internal)?;
        let count = page.read_u16(COUNT) as usize;
        let mut reader = Reader::new(page.data(), BODY, page.no());
        let mut keys = Vec::with_capacity(count);
        let mut children = Vec::with_capacity(count + 1);
        for _ in 0..count {
            keys.push(reader.key()?);
            children.push(PageNo::new(reader.u64()?));
        }
        children.push(PageNo::new(page.read_u64(LINK_A)));
        Ok(Self {
            no: page.no(),
            keys,
            children,
        })
    }
}

/// Any tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A leaf.
    Leaf(LeafNode),
    /// An internal node.
    Internal(InternalNode),
}

impl Node {
    /// Decodes a node page of either kind.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the page is not a node.
    pub fn from_page(page: &Page) -> CoreResult<Self> {
        match page.page_type() {
            Some(PageType::Leaf) => LeafNode::from_page(page).map(Node::Leaf),
            Some(PageType::Internal) => InternalNode::from_page(page).map(Node::Internal),
            other => Err(CoreError::corrupt(format!(
                "{} is not a tree node ({other:?})",
                page.no()
            ))),
        }
    }
}

fn put_key(data: &mut [u8], at: usize, key: &[u8]) -> usize {
    data[at..at + 2].copy_from_slice(&(key.len() as u16).to_le_bytes());
    data[at + 2..at + 2 + key.len()].copy_from_slice(key);
    at + 2 + key.len()
}

/// Bounds-checked reader over a node body.
struct Reader<'a> {
    data: &'a [u8],
    at: usize,
    page: PageNo,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], at: usize, page: PageNo) -> Self {
        Self { data, at, page }
    }

    fn bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self.at.checked_add(len).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(CoreError::corrupt(format!("{} has a cell past the page end", self.page)));
        };
        let out = &self.data[self.at..end];
        self.at = end;
        Ok(out)
    }

    fn byte(&mut self) -> CoreResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.bytes(8)?);
        Ok(u64::from_le_bytes(out))
    }

    fn key(&mut self) -> CoreResult<Vec<u8>> {
        let b = self.bytes(2)?;
        let len = u16::from_le_bytes([b[0], b[1]]) as usize;
        Ok(self.bytes(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limits_scale_with_page_size() {
        assert_eq!(max_cell_size(512), 119);
        assert_eq!(max_key_len(512), 100);
        assert!(fits_inline(4096, 10, 900));
        assert!(!fits_inline(4096, 10, 1200));
    }

    #[test]
    fn leaf_round_trip() {
        let leaf = LeafNode {
            no: PageNo::new(3),
            cells: vec![
                LeafCell {
                    key: b"alpha".to_vec(),
                    value: CellValue::Inline(b"one".to_vec()),
                },
                LeafCell {
                    key: b"beta".to_vec(),
                    value: CellValue::Overflow {
                        len: 70_000,
                        first: PageNo::new(9),
                    },
                },
                LeafCell {
                    key: b"gamma".to_vec(),
                    value: CellValue::Inline(Vec::new()),
                },
            ],
            next: PageNo::new(4),
            prev: PageNo::new(2),
        };
        let page = leaf.to_page(512);
        assert_eq!(LeafNode::from_page(&page).unwrap(), leaf);
        assert_eq!(leaf.search(b"beta"), Ok(1));
        assert_eq!(leaf.search(b"b"), Err(1));
    }

    #[test]
    fn internal_round_trip_and_routing() {
        let node = InternalNode {
            no: PageNo::new(1),
            keys: vec![b"g".to_vec(), b"p".to_vec()],
            children: vec![PageNo::new(2), PageNo::new(3), PageNo::new(4)],
        };
        let page = node.to_page(512);
        assert_eq!(InternalNode::from_page(&page).unwrap(), node);

        assert_eq!(node.child_index(b"a"), 0);
        assert_eq!(node.child_index(b"g"), 1);
        assert_eq!(node.child_index(b"o"), 1);
        assert_eq!(node.child_index(b"p"), 2);
        assert_eq!(node.child_index(b"zzz"), 2);
    }

    #[test]
    fn truncated_cell_is_corrupt() {
        let mut page = Page::new(PageNo::new(1), 512, PageType::Leaf);
        page.write_u16(COUNT, 1);
        page.write_u16(BODY, 2000);
        assert!(LeafNode::from_page(&page).unwrap_err().is_corruption());
        assert!(Node::from_page(&Page::new(PageNo::new(1), 512, PageType::Overflow)).is_err());
    }
}
