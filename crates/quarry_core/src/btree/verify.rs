//! Structural integrity check.

use super::node::{CellValue, LeafNode, Node};
use super::overflow::{chain_pages, read_chain};
use crate::error::{CoreError, CoreResult};
use crate::pager::Pager;
use crate::types::PageNo;
use std::collections::HashSet;

/// Summary of a successful integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifyReport {
    /// Pages in the file, header included.
    pub pages: u64,
    /// Tree height; zero for an empty tree.
    pub depth: usize,
    /// Leaf pages.
    pub leaf_pages: u64,
    /// Internal pages.
    pub internal_pages: u64,
    /// Overflow pages.
    pub overflow_pages: u64,
    /// Free pages, trunks included.
    pub free_pages: u64,
    /// Records found by walking the leaves.
    pub records: u64,
}

struct Walk {
    report: VerifyReport,
    seen: HashSet<PageNo>,
    leaves: Vec<LeafNode>,
    leaf_depth: Option<usize>,
}

impl Walk {
    fn claim(&mut self, no: PageNo, what: &str) -> CoreResult<()> {
        if !self.seen.insert(no) {
            return Err(CoreError::corrupt(format!("{no} is referenced twice ({what})")));
        }
        Ok(())
    }
}

/// Walks every page of the store and checks:
///
/// - page checksums and types
/// - key order inside nodes and against parent separators
/// - uniform leaf depth and consistent sibling links
/// - overflow chain lengths
/// - that every page is either in the tree, in an overflow chain or free,
///   exactly once, and that the header counters agree
///
/// # Errors
///
/// Returns `Corrupt` describing the first violation found.
pub fn verify(pager: &mut Pager) -> CoreResult<VerifyReport> {
    let mut walk = Walk {
        report: VerifyReport {
            pages: pager.page_count(),
            ..VerifyReport::default()
        },
        seen: HashSet::new(),
        leaves: Vec::new(),
        leaf_depth: None,
    };

    let root = pager.root();
    if !root.is_none() {
        check_node(pager, &mut walk, root, None, None, 1)?;
    }
    walk.report.depth = walk.leaf_depth.unwrap_or(0);
    check_leaf_chain(&walk.leaves)?;

    let free = pager.free_pages()?;
    for &no in &free {
        walk.claim(no, "free list")?;
    }
    walk.report.free_pages = free.len() as u64;

    let header = pager.header();
    if header.free_count != walk.report.free_pages {
        return Err(CoreError::corrupt(format!(
            "header counts {} free pages, free list holds {}",
            header.free_count, walk.report.free_pages
        )));
    }
    if header.record_count != walk.report.records {
        return Err(CoreError::corrupt(format!(
            "header counts {} records, tree holds {}",
            header.record_count, walk.report.records
        )));
    }
    let accounted = walk.seen.len() as u64 + 1;
    if accounted != header.page_count {
        return Err(CoreError::corrupt(format!(
            "{} of {} pages are accounted for",
            accounted, header.page_count
        )));
    }
    if let Some(bad) = walk.seen.iter().find(|no| no.as_u64() >= header.page_count) {
        return Err(CoreError::corrupt(format!("{bad} lies past the end of the file")));
    }
    Ok(walk.report)
}

fn check_node(
    pager: &mut Pager,
    walk: &mut Walk,
    no: PageNo,
    lower: Option<&[u8]>,
    upper: Option<&[u8]>,
    depth: usize,
) -> CoreResult<()> {
    walk.claim(no, "tree")?;
    let page = pager.read(no)?;
    match Node::from_page(&page)? {
        Node::Leaf(leaf) => {
            match walk.leaf_depth {
                None => walk.leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(CoreError::corrupt(format!(
                        "leaf {no} at depth {depth}, expected {d}"
                    )))
                }
                Some(_) => {}
            }
            let keys: Vec<&[u8]> = leaf.cells.iter().map(|c| c.key.as_slice()).collect();
            check_keys(no, &keys, lower, upper)?;
            for cell in &leaf.cells {
                if let CellValue::Overflow { len, first } = &cell.value {
                    read_chain(pager, *first, *len)?;
                    for page in chain_pages(pager, *first)? {
                        walk.claim(page, "overflow")?;
                        walk.report.overflow_pages += 1;
                    }
                }
            }
            walk.report.leaf_pages += 1;
            walk.report.records += leaf.cells.len() as u64;
            walk.leaves.push(leaf);
        }
        Node::Internal(node) => {
            if node.children.len() != node.keys.len() + 1 {
                return Err(CoreError::corrupt(format!("{no} has mismatched children")));
            }
            let keys: Vec<&[u8]> = node.keys.iter().map(Vec::as_slice).collect();
            check_keys(no, &keys, lower, upper)?;
            walk.report.internal_pages += 1;
            for (i, &child) in node.children.iter().enumerate() {
                let lo = if i == 0 { lower } else { Some(keys[i - 1]) };
                let hi = if i == keys.len() { upper } else { Some(keys[i]) };
                check_node(pager, walk, child, lo, hi, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Keys must be strictly increasing and within `[lower, upper)`.
fn check_keys(
    no: PageNo,
    keys: &[&[u8]],
    lower: Option<&[u8]>,
    upper: Option<&[u8]>,
) -> CoreResult<()> {
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CoreError::corrupt(format!("{no} has keys out of order")));
    }
    if let (Some(lo), Some(first)) = (lower, keys.first()) {
        if *first < lo {
            return Err(CoreError::corrupt(format!("{no} has a key below its range")));
        }
    }
    if let (Some(hi), Some(last)) = (upper, keys.last()) {
        if *last >= hi {
            return Err(CoreError::corrupt(format!("{no} has a key above its range")));
        }
    }
    Ok(())
}

fn check_leaf_chain(leaves: &[LeafNode]) -> CoreResult<()> {
    for (i, leaf) in leaves.iter().enumerate() {
        let prev = if i == 0 { PageNo::NONE } else { leaves[i - 1].no };
        let next = leaves.get(i + 1).map_or(PageNo::NONE, |l| l.no);
        if leaf.prev != prev || leaf.next != next {
            return Err(CoreError::corrupt(format!(
                "leaf {} links to {}/{}, expected {prev}/{next}",
                leaf.no, leaf.prev, leaf.next
            )));
        }
    }
    Ok(())
}
