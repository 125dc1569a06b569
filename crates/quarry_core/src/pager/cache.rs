//! Page cache.
//!
//! Dirty pages live in an unbounded map until they are committed or spilled.
//! Clean pages live in an LRU bounded by the configured capacity.

use super::page::Page;
use crate::types::PageNo;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Two-tier page cache.
pub struct PageCache {
    dirty: HashMap<PageNo, Page>,
    clean: LruCache<PageNo, Page>,
    capacity: NonZeroUsize,
}

impl PageCache {
    /// Creates a cache holding up to `capacity` pages (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            dirty: HashMap::new(),
            clean: LruCache::new(capacity),
            capacity,
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Changes the capacity, evicting clean pages as needed.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        self.clean.resize(self.capacity);
    }

    /// Looks a page up, preferring the dirty copy.
    pub fn get(&mut self, no: PageNo) -> Option<&Page> {
        if let Some(page) = self.dirty.get(&no) {
            return Some(page);
        }
        self.clean.get(&no)
    }

    /// Caches a page read from storage.
    pub fn insert_clean(&mut self, page: Page) {
        if !self.dirty.contains_key(&page.no()) {
            self.clean.put(page.no(), page);
        }
    }

    /// Stores a modified page.
    pub fn insert_dirty(&mut self, page: Page) {
        self.clean.pop(&page.no());
        self.dirty.insert(page.no(), page);
    }

    /// Forgets a page entirely.
    pub fn discard(&mut self, no: PageNo) {
        self.dirty.remove(&no);
        self.clean.pop(&no);
    }

    /// Returns `true` if the dirty set exceeds capacity.
    pub fn over_capacity(&self) -> bool {
        self.dirty.len() > self.capacity.get()
    }

    /// Dirty pages sorted by page number.
    pub fn dirty_pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.dirty.values().collect();
        pages.sort_by_key(|p| p.no());
        pages
    }

    /// Moves every dirty page to the clean tier.
    pub fn mark_all_clean(&mut self) {
        for (no, page) in self.dirty.drain() {
            self.clean.put(no, page);
        }
    }

    /// Drops every cached page.
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.clean.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::page::PageType;

    fn page(no: u64) -> Page {
        Page::new(PageNo::new(no), 512, PageType::Leaf)
    }

    #[test]
    fn clean_pages_are_bounded() {
        let mut cache = PageCache::new(2);
        cache.insert_clean(page(1));
        cache.insert_clean(page(2));
        cache.insert_clean(page(3));
        assert!(cache.get(PageNo::new(1)).is_none());
        assert!(cache.get(PageNo::new(3)).is_some());
    }

    #[test]
    fn dirty_pages_are_pinned_and_shadow_clean() {
        let mut cache = PageCache::new(1);
        let mut p = page(1);
        p.write_u32(100, 7);
        cache.insert_clean(page(1));
        cache.insert_dirty(p);
        cache.insert_dirty(page(2));

        assert_eq!(cache.dirty_pages().len(), 2);
        assert!(cache.over_capacity());
        assert_eq!(cache.get(PageNo::new(1)).unwrap().read_u32(100), 7);

        // a clean copy never replaces a dirty one
        cache.insert_clean(page(1));
        assert_eq!(cache.get(PageNo::new(1)).unwrap().read_u32(100), 7);
    }

    #[test]
    fn dirty_pages_sorted_and_cleaned() {
        let mut cache = PageCache::new(8);
        for no in [5, 2, 9] {
            cache.insert_dirty(page(no));
        }
        let order: Vec<u64> = cache.dirty_pages().iter().map(|p| p.no().as_u64()).collect();
        assert_eq!(order, vec![2, 5, 9]);

        cache.mark_all_clean();
        assert_eq!(cache.dirty_pages().len(), 0);
        assert!(cache.get(PageNo::new(9)).is_some());
    }
}
