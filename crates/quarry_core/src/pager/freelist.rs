//! Free-page list.
//!
//! Free pages are tracked in a chain of trunk pages:
//!
//! ```text
//! [16..24]  next trunk page (0 = end)
//! [24..28]  number of entries
//! [28..]    free page numbers, u64 each
//! ```
//!
//! A trunk is itself a free page and counts toward `free_count`.

use super::manager::Pager;
use super::page::{Page, PageType, PAGE_HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::types::PageNo;
use std::collections::HashSet;

const NEXT: usize = PAGE_HEADER_SIZE;
const COUNT: usize = PAGE_HEADER_SIZE + 8;
const ENTRIES: usize = PAGE_HEADER_SIZE + 12;

/// Number of entries one trunk page can hold.
#[must_use]
pub fn trunk_capacity(page_size: usize) -> usize {
    (page_size - ENTRIES) / 8
}

impl Pager {
    /// Returns a page number for a new page: the last entry of the head
    /// trunk, the head trunk itself once it is empty, or a page past the end
    /// of the file.
    pub(crate) fn allocate_page(&mut self) -> CoreResult<PageNo> {
        let head = self.header().freelist_head;
        if head.is_none() {
            let header = self.header_mut();
            let no = PageNo::new(header.page_count);
            header.page_count += 1;
            return Ok(no);
        }

        let mut trunk = self.read(head)?;
        trunk.expect_type(PageType::FreeTrunk)?;
        let count = trunk.read_u32(COUNT) as usize;
        let no = if count > 0 {
            let no = PageNo::new(trunk.read_u64(ENTRIES + (count - 1) * 8));
            trunk.write_u32(COUNT, (count - 1) as u32);
            self.write(trunk)?;
            no
        } else {
            self.header_mut().freelist_head = PageNo::new(trunk.read_u64(NEXT));
            head
        };
        let header = self.header_mut();
        header.free_count = header
            .free_count
            .checked_sub(1)
            .ok_or_else(|| CoreError::corrupt("free page count underflow"))?;
        if no.is_none() || no.as_u64() >= header.page_count {
            return Err(CoreError::corrupt(format!("free list holds invalid {no}")));
        }
        Ok(no)
    }

    /// Returns a page to the free list.
    pub(crate) fn free_page(&mut self, no: PageNo) -> CoreResult<()> {
        let head = self.header().freelist_head;
        let page_size = self.page_size();

        if !head.is_none() {
            let mut trunk = self.read(head)?;
            trunk.expect_type(PageType::FreeTrunk)?;
            let count = trunk.read_u32(COUNT) as usize;
            if count < trunk_capacity(page_size) {
                trunk.write_u64(ENTRIES + count * 8, no.as_u64());
                trunk.write_u32(COUNT, (count + 1) as u32);
                self.write(trunk)?;
                self.forget(no);
                self.header_mut().free_count += 1;
                return Ok(());
            }
        }

        let mut trunk = Page::new(no, page_size, PageType::FreeTrunk);
        trunk.write_u64(NEXT, head.as_u64());
        self.write(trunk)?;
        let header = self.header_mut();
        header.freelist_head = no;
        header.free_count += 1;
        Ok(())
    }

    /// Every free page, trunks included, in chain order.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the chain loops or holds a bad page.
    pub fn free_pages(&mut self) -> CoreResult<Vec<PageNo>> {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut trunk_no = self.header().freelist_head;
        while !trunk_no.is_none() {
            if !seen.insert(trunk_no) {
                return Err(CoreError::corrupt(format!("free list loops at {trunk_no}")));
            }
            let trunk = self.read(trunk_no)?;
            trunk.expect_type(PageType::FreeTrunk)?;
            pages.push(trunk_no);
            let count = trunk.read_u32(COUNT) as usize;
            if count > trunk_capacity(self.page_size()) {
                return Err(CoreError::corrupt(format!(
                    "free trunk {trunk_no} claims {count} entries"
                )));
            }
            for i in 0..count {
                pages.push(PageNo::new(trunk.read_u64(ENTRIES + i * 8)));
            }
            trunk_no = PageNo::new(trunk.read_u64(NEXT));
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENGINE;
    use crate::pager::PagerOptions;
    use crate::stats::DatabaseStats;
    use crate::types::TransactionId;
    use quarry_storage::InMemoryBackend;
    use std::sync::Arc;

    const PS: usize = 512;

    fn pager() -> Pager {
        let options = PagerOptions {
            page_size: PS,
            cache_pages: 64,
            engine: DEFAULT_ENGINE.to_string(),
            read_only: false,
            sync_on_commit: true,
        };
        let (mut pager, _) = Pager::open(
            Box::new(InMemoryBackend::new()),
            Some(Box::new(InMemoryBackend::new())),
            options,
            Arc::new(DatabaseStats::new()),
        )
        .unwrap();
        pager.begin(TransactionId::new(1)).unwrap();
        pager
    }

    fn grab(pager: &mut Pager) -> PageNo {
        let page = pager.allocate(PageType::Leaf).unwrap();
        let no = page.no();
        pager.write(page).unwrap();
        no
    }

    #[test]
    fn allocation_extends_then_reuses() {
        let mut pager = pager();
        let a = grab(&mut pager);
        let b = grab(&mut pager);
        let c = grab(&mut pager);
        assert_eq!((a.0, b.0, c.0), (1, 2, 3));

        pager.free_page(a).unwrap();
        pager.free_page(b).unwrap();
        assert_eq!(pager.header().free_count, 2);
        assert_eq!(pager.free_pages().unwrap(), vec![a, b]);

        // b sits in trunk a; it comes back first, then the trunk itself
        assert_eq!(grab(&mut pager), b);
        assert_eq!(grab(&mut pager), a);
        assert_eq!(pager.header().free_count, 0);
        assert!(pager.header().freelist_head.is_none());
        assert_eq!(grab(&mut pager).0, 4);
    }

    #[test]
    fn full_trunk_starts_a_new_one() {
        let mut pager = pager();
        let cap = trunk_capacity(PS);
        let pages: Vec<PageNo> = (0..cap + 3).map(|_| grab(&mut pager)).collect();
        for &no in &pages {
            pager.free_page(no).unwrap();
        }
        let free = pager.free_pages().unwrap();
        assert_eq!(free.len(), pages.len());
        assert_eq!(pager.header().free_count as usize, pages.len());
        let unique: HashSet<_> = free.iter().copied().collect();
        assert_eq!(unique.len(), free.len());
    }
}
