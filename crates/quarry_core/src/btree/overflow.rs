//! Overflow chains for values too large to live in a leaf.
//!
//! ```text
//! [16..24]  next overflow page (0 = last)
//! [24..28]  bytes of data in this page
//! [28..]    data
//! ```

use crate::error::{CoreError, CoreResult};
use crate::pager::{PageType, Pager, PAGE_HEADER_SIZE};
use crate::types::PageNo;
use std::collections::HashSet;

const NEXT: usize = PAGE_HEADER_SIZE;
const LEN: usize = PAGE_HEADER_SIZE + 8;
const DATA: usize = PAGE_HEADER_SIZE + 12;

/// Data bytes carried by one overflow page.
#[must_use]
pub fn chunk_size(page_size: usize) -> usize {
    page_size - DATA
}

/// Writes `data` to a new chain and returns its first page.
pub fn write_chain(pager: &mut Pager, data: &[u8]) -> CoreResult<PageNo> {
    let chunk = chunk_size(pager.page_size());
    let count = data.len().div_ceil(chunk).max(1);
    let mut pages = Vec::with_capacity(count);
    for _ in 0..count {
        pages.push(pager.allocate(PageType::Overflow)?);
    }
    let nos: Vec<PageNo> = pages.iter().map(|p| p.no()).collect();
    for (i, mut page) in pages.into_iter().enumerate() {
        let piece = &data[(i * chunk).min(data.len())..((i + 1) * chunk).min(data.len())];
        let next = nos.get(i + 1).copied().unwrap_or(PageNo::NONE);
        page.write_u64(NEXT, next.as_u64());
        page.write_u32(LEN, piece.len() as u32);
        page.data_mut()[DATA..DATA + piece.len()].copy_from_slice(piece);
        pager.write(page)?;
    }
    Ok(nos[0])
}

/// Reads a chain of `len` bytes starting at `first`.
///
/// # Errors
///
/// Returns `Corrupt` if the chain is shorter or longer than `len`, loops, or
/// passes through a page that is not an overflow page.
pub fn read_chain(pager: &mut Pager, first: PageNo, len: u64) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(len as usize);
    for_each_page(pager, first, |page_data| out.extend_from_slice(page_data))?;
    if out.len() as u64 != len {
        return Err(CoreError::corrupt(format!(
            "overflow chain at {first} holds {} bytes, expected {len}",
            out.len()
        )));
    }
    Ok(out)
}

/// Returns every page of a chain to the free list.
pub fn free_chain(pager: &mut Pager, first: PageNo) -> CoreResult<()> {
    for no in chain_pages(pager, first)? {
        pager.free_page(no)?;
    }
    Ok(())
}

/// Page numbers of a chain, in order.
pub fn chain_pages(pager: &mut Pager, first: PageNo) -> CoreResult<Vec<PageNo>> {
    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let mut no = first;
    while !no.is_none() {
        if !seen.insert(no) {
            return Err(CoreError::corrupt(format!("overflow chain loops at {no}")));
        }
        let page = pager.read(no)?;
        page.expect_type(PageType::Overflow)?;
        pages.push(no);
        no = PageNo::new(page.read_u64(NEXT));
    }
    Ok(pages)
}

fn for_each_page(
    pager: &mut Pager,
    first: PageNo,
    mut f: impl FnMut(&[u8]),
) -> CoreResult<()> {
    let limit = chunk_size(pager.page_size());
    for no in chain_pages(pager, first)? {
        let page = pager.read(no)?;
        let len = page.read_u32(LEN) as usize;
        if len > limit {
            return Err(CoreError::corrupt(format!("{no} claims {len} overflow bytes")));
        }
        f(&page.data()[DATA..DATA + len]);
    }
    Ok(())
}
