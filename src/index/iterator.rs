//! Forward iteration over a leaf chain. Holds a `ReadPageGuard` on the
//! current leaf; the guard's own `Drop` releases the pin, so early return,
//! `?`, and panic unwind all release it the same way a scoped block would.

use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::index::generic_key::GenericKey;
use crate::index::leaf_page::LeafPage;
use crate::index::row_id::RowId;
use crate::storage::page::page_guard::ReadPageGuard;

/// Yields `(key, row_id)` pairs across the leaf chain in sorted order.
/// Exhausted once the chain runs out; a fresh one never re-fetches a leaf it
/// has already passed.
pub struct IndexIterator<const N: usize> {
    bpm: Arc<BufferPoolManager>,
    leaf: Option<ReadPageGuard>,
    slot: usize,
}

impl<const N: usize> IndexIterator<N> {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, leaf: ReadPageGuard, slot: usize) -> Self {
        Self {
            bpm,
            leaf: Some(leaf),
            slot,
        }
    }

    pub(crate) fn exhausted(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            leaf: None,
            slot: 0,
        }
    }

    fn current_leaf_page_id(&self) -> PageId {
        self.leaf.as_ref().map(|g| g.page_id()).unwrap_or(INVALID_PAGE_ID)
    }
}

impl<const N: usize> Iterator for IndexIterator<N> {
    type Item = (GenericKey<N>, RowId);

    fn next(&mut self) -> Option<Self::Item> {
        let guard = self.leaf.as_ref()?;
        let view = LeafPage::<N>::new(guard.get_data());
        if self.slot >= view.size() {
            return None;
        }
        let item = (view.key_at(self.slot), view.value_at(self.slot));

        if self.slot + 1 < view.size() {
            self.slot += 1;
        } else {
            let next_page_id = view.next_page_id();
            self.leaf = None;
            if next_page_id != INVALID_PAGE_ID {
                if let Ok(next_guard) = self.bpm.fetch_page_read(next_page_id) {
                    self.leaf = Some(next_guard);
                    self.slot = 0;
                }
            }
        }
        Some(item)
    }
}

impl<const N: usize> PartialEq for IndexIterator<N> {
    fn eq(&self, other: &Self) -> bool {
        self.current_leaf_page_id() == other.current_leaf_page_id() && self.slot == other.slot
    }
}

impl<const N: usize> Eq for IndexIterator<N> {}
