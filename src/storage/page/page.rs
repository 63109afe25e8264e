use std::sync::Arc;

use parking_lot::{
    ArcRwLockReadGuard, ArcRwLockWriteGuard, MappedRwLockReadGuard, MappedRwLockWriteGuard,
    RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::config::{Lsn, PageId, INVALID_PAGE_ID, PAGE_SIZE};

const OFFSET_LSN: usize = 4;

/// The basic unit of storage within the database system: a wrapper around a
/// `PAGE_SIZE`-byte buffer held in a buffer pool frame, plus the book-keeping
/// fields (pin count, dirty flag, page id) the buffer pool manager needs.
#[derive(Debug, Clone)]
pub struct Page(Arc<RwLock<PageInner>>);

/// The frame's latch doubles as its data cell: holding a read/write guard on
/// this type *is* holding the page's latch, which is what lets
/// `ReadPageGuard`/`WritePageGuard` take the latch at construction and keep
/// it for their whole lifetime.
#[derive(Debug)]
pub(crate) struct PageInner {
    pub(crate) data: [u8; PAGE_SIZE],
    pub(crate) page_id: PageId,
    pub(crate) pin_count: i32,
    pub(crate) is_dirty: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    /// Constructs an empty frame slot: no page resident, zeroed data.
    pub fn new() -> Page {
        let inner = PageInner {
            data: [0; PAGE_SIZE],
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        };
        Page(Arc::new(RwLock::new(inner)))
    }

    /// Resets this frame slot to hold no page, ready for reuse.
    pub fn reset(&self) {
        let mut p = self.0.write();
        p.data.fill(0);
        p.page_id = INVALID_PAGE_ID;
        p.pin_count = 0;
        p.is_dirty = false;
    }

    pub fn get_data(&self) -> MappedRwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        RwLockReadGuard::map(self.0.read(), |i| &i.data)
    }

    pub fn get_mut_data(&self) -> MappedRwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        RwLockWriteGuard::map(self.0.write(), |i| &mut i.data)
    }

    /// Takes this page's latch for reading, for the returned guard's whole
    /// lifetime rather than one call — what `ReadPageGuard` holds.
    pub(crate) fn latch_read(&self) -> ArcRwLockReadGuard<RawRwLock, PageInner> {
        self.0.read_arc()
    }

    /// Takes this page's latch for writing, held for the guard's lifetime —
    /// what `WritePageGuard` holds.
    pub(crate) fn latch_write(&self) -> ArcRwLockWriteGuard<RawRwLock, PageInner> {
        self.0.write_arc()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.0.write().page_id = page_id;
    }

    pub fn get_page_id(&self) -> PageId {
        self.0.read().page_id
    }

    pub fn get_pin_count(&self) -> i32 {
        self.0.read().pin_count
    }

    pub fn pin(&self) {
        self.0.write().pin_count += 1;
    }

    /// Decrements the pin count. Never goes below zero; the buffer pool
    /// manager is responsible for rejecting unbalanced unpins upstream.
    pub fn unpin(&self) {
        let mut inner = self.0.write();
        if inner.pin_count > 0 {
            inner.pin_count -= 1;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.0.read().is_dirty
    }

    /// Dirty is OR-only here: callers pass `true` to mark, never `false` to
    /// clear (clearing happens only on flush, in the buffer pool manager).
    pub fn set_dirty(&self, is_dirty: bool) {
        if is_dirty {
            self.0.write().is_dirty = true;
        }
    }

    /// Flush-time hook: clears the dirty flag once the page is durable.
    pub fn clear_dirty(&self) {
        self.0.write().is_dirty = false;
    }

    pub fn get_lsn(&self) -> Lsn {
        let inner = self.0.read();
        Lsn::from_ne_bytes(
            inner.data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_lsn(&self, lsn: Lsn) {
        let mut inner = self.0.write();
        let lsn_bytes = lsn.to_ne_bytes();
        inner.data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()].copy_from_slice(&lsn_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_has_no_id_and_is_clean() {
        let page = Page::new();
        assert_eq!(page.get_page_id(), INVALID_PAGE_ID);
        assert!(!page.is_dirty());
        assert_eq!(page.get_pin_count(), 0);
    }

    #[test]
    fn dirty_flag_is_or_only_until_cleared() {
        let page = Page::new();
        page.set_dirty(false);
        assert!(!page.is_dirty());
        page.set_dirty(true);
        page.set_dirty(false);
        assert!(page.is_dirty());
        page.clear_dirty();
        assert!(!page.is_dirty());
    }

    #[test]
    fn reset_clears_everything() {
        let page = Page::new();
        page.set_page_id(7);
        page.pin();
        page.set_dirty(true);
        page.reset();
        assert_eq!(page.get_page_id(), INVALID_PAGE_ID);
        assert_eq!(page.get_pin_count(), 0);
        assert!(!page.is_dirty());
    }
}
