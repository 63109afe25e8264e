//! The on-disk B+ tree itself: every node is a page riding on the buffer
//! pool, fetched and latched through a page guard.
//!
//! Structural maintenance (split, coalesce, redistribute, adjust-root) walks
//! one page at a time rather than holding a whole root-to-leaf latch chain:
//! a guard is dropped as soon as the next one it depends on has been
//! fetched, and any page that needs to reach its parent does so by
//! refetching through the parent pointer recorded in its own header.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, INDEX_ROOTS_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE};
use crate::common::error::{DbError, DbResult};
use crate::index::b_plus_tree_page::min_size;
use crate::index::generic_key::GenericKey;
use crate::index::index_roots_page::{IndexRootsPage, IndexRootsPageMut};
use crate::index::internal_page::{internal_capacity, InternalPage, InternalPageMut};
use crate::index::iterator::IndexIterator;
use crate::index::leaf_page::{leaf_capacity, LeafPage, LeafPageMut};
use crate::index::row_id::RowId;
use crate::storage::page::page_guard::WritePageGuard;

/// One index's worth of B+ tree state: the identity it is registered under
/// in the index-roots page, and the buffer pool its nodes live in. `N` is
/// the key width in bytes, the Rust stand-in for the original's
/// `GenericKey<N>` template instantiation.
pub struct BPlusTree<const N: usize> {
    index_id: u32,
    bpm: Arc<BufferPoolManager>,
    root_page_id: Mutex<PageId>,
    /// Hot-path shortcut: the leaf a `covers()` check most recently
    /// succeeded against, re-validated under its own latch before use and
    /// falling back to a full root descent on mismatch.
    last_leaf_page_id: Mutex<PageId>,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<const N: usize> BPlusTree<N> {
    /// Opens (or begins) the tree registered under `index_id`. `leaf_max_size`
    /// / `internal_max_size` default to the largest a page of this key width
    /// can hold when `None`.
    pub fn new(
        index_id: u32,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: Option<usize>,
        internal_max_size: Option<usize>,
    ) -> DbResult<Self> {
        bpm.reserve_page(INDEX_ROOTS_PAGE_ID)?;

        let root_page_id = {
            let guard = bpm.fetch_page_read(INDEX_ROOTS_PAGE_ID)?;
            IndexRootsPage::new(guard.get_data())
                .get_root_id(index_id)
                .unwrap_or(INVALID_PAGE_ID)
        };

        let tree = Self {
            index_id,
            bpm,
            root_page_id: Mutex::new(root_page_id),
            last_leaf_page_id: Mutex::new(INVALID_PAGE_ID),
            leaf_max_size: leaf_max_size.unwrap_or_else(|| leaf_capacity(PAGE_SIZE, N)),
            internal_max_size: internal_max_size.unwrap_or_else(|| internal_capacity(PAGE_SIZE, N)),
        };

        if root_page_id != INVALID_PAGE_ID {
            let leftmost = tree.find_leftmost_leaf_read(root_page_id)?;
            *tree.last_leaf_page_id.lock() = leftmost.page_id();
        }
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.root_id() == INVALID_PAGE_ID
    }

    fn root_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    fn leaf_min_size(&self) -> usize {
        min_size(self.leaf_max_size as u32) as usize
    }

    fn internal_min_size(&self) -> usize {
        min_size(self.internal_max_size as u32) as usize
    }

    // ---- lookup -------------------------------------------------------

    pub fn get_value(&self, key: &GenericKey<N>) -> DbResult<Option<RowId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let guard = self.find_leaf_for_read(key)?;
        Ok(LeafPage::<N>::new(guard.get_data()).lookup(key))
    }

    fn find_leftmost_leaf_read(&self, start: PageId) -> DbResult<crate::storage::page::page_guard::ReadPageGuard> {
        let mut guard = self.bpm.fetch_page_read(start)?;
        loop {
            let is_leaf = InternalPage::<N>::new(guard.get_data()).is_leaf_page();
            if is_leaf {
                return Ok(guard);
            }
            let child = InternalPage::<N>::new(guard.get_data()).value_at(0);
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    fn find_leaf_for_read(&self, key: &GenericKey<N>) -> DbResult<crate::storage::page::page_guard::ReadPageGuard> {
        let last = *self.last_leaf_page_id.lock();
        if last != INVALID_PAGE_ID {
            if let Ok(guard) = self.bpm.fetch_page_read(last) {
                let view = LeafPage::<N>::new(guard.get_data());
                if view.is_leaf_page() && view.covers(key) {
                    return Ok(guard);
                }
            }
        }

        let root_id = self.root_id();
        if root_id == INVALID_PAGE_ID {
            return Err(DbError::KeyNotFound);
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        loop {
            let is_leaf = InternalPage::<N>::new(guard.get_data()).is_leaf_page();
            if is_leaf {
                *self.last_leaf_page_id.lock() = guard.page_id();
                return Ok(guard);
            }
            let child = InternalPage::<N>::new(guard.get_data()).lookup(key);
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    fn find_leaf_for_write(&self, key: &GenericKey<N>) -> DbResult<WritePageGuard> {
        let last = *self.last_leaf_page_id.lock();
        if last != INVALID_PAGE_ID {
            if let Ok(guard) = self.bpm.fetch_page_write(last) {
                let view = LeafPage::<N>::new(guard.get_data());
                if view.is_leaf_page() && view.covers(key) {
                    return Ok(guard);
                }
                // Stale: the page was split, merged, or recycled since it was
                // cached. Drop this guard and fall through to a root descent.
            }
        }

        let root_id = self.root_id();
        if root_id == INVALID_PAGE_ID {
            return Err(DbError::KeyNotFound);
        }
        let mut guard = self.bpm.fetch_page_write(root_id)?;
        loop {
            let is_leaf = InternalPage::<N>::new(guard.get_data()).is_leaf_page();
            if is_leaf {
                return Ok(guard);
            }
            let child = InternalPage::<N>::new(guard.get_data()).lookup(key);
            guard = self.bpm.fetch_page_write(child)?;
        }
    }

    fn set_parent_page_id(&self, page_id: PageId, parent_id: PageId) -> DbResult<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        InternalPageMut::<N>::new(guard.get_data_mut()).set_parent_page_id(parent_id);
        Ok(())
    }

    fn update_root_page_id(&self, is_new: bool) -> DbResult<()> {
        let mut guard = self.bpm.fetch_page_write(INDEX_ROOTS_PAGE_ID)?;
        let root_id = self.root_id();
        let mut roots = IndexRootsPageMut::new(guard.get_data_mut());
        if is_new {
            roots.insert(self.index_id, root_id);
        } else {
            roots.update(self.index_id, root_id);
        }
        Ok(())
    }

    // ---- insertion ------------------------------------------------------

    /// Inserts `(key, value)`. Returns `false` without modifying the tree if
    /// `key` is already present.
    pub fn insert(&self, key: GenericKey<N>, value: RowId) -> DbResult<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }
        self.insert_into_leaf(key, value)
    }

    fn start_new_tree(&self, key: GenericKey<N>, value: RowId) -> DbResult<()> {
        let mut guard = self.bpm.new_page_guarded()?.upgrade_write();
        let page_id = guard.page_id();
        {
            let mut leaf = LeafPageMut::<N>::new(guard.get_data_mut());
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value);
        }
        drop(guard);

        *self.root_page_id.lock() = page_id;
        *self.last_leaf_page_id.lock() = page_id;
        self.update_root_page_id(true)
    }

    fn insert_into_leaf(&self, key: GenericKey<N>, value: RowId) -> DbResult<bool> {
        let mut leaf_guard = self.find_leaf_for_write(&key)?;
        let leaf_id = leaf_guard.page_id();

        if LeafPage::<N>::new(leaf_guard.get_data()).lookup(&key).is_some() {
            return Ok(false);
        }

        let new_size = LeafPageMut::<N>::new(leaf_guard.get_data_mut()).insert(key, value);
        *self.last_leaf_page_id.lock() = leaf_id;

        if new_size > self.leaf_max_size {
            let parent_id = LeafPage::<N>::new(leaf_guard.get_data()).parent_page_id();
            let (sibling_id, sibling_key) = self.split_leaf(&mut leaf_guard)?;
            *self.last_leaf_page_id.lock() = sibling_id;
            drop(leaf_guard);
            self.insert_into_parent(leaf_id, parent_id, sibling_key, sibling_id)?;
        }
        Ok(true)
    }

    fn split_leaf(&self, leaf_guard: &mut WritePageGuard) -> DbResult<(PageId, GenericKey<N>)> {
        let parent_id = LeafPage::<N>::new(leaf_guard.get_data()).parent_page_id();
        let mut sibling_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let sibling_id = sibling_guard.page_id();
        {
            let old_next = LeafPage::<N>::new(leaf_guard.get_data()).next_page_id();
            let mut leaf = LeafPageMut::<N>::new(leaf_guard.get_data_mut());
            let mut sibling = LeafPageMut::<N>::new(sibling_guard.get_data_mut());
            sibling.init(sibling_id, parent_id, self.leaf_max_size);
            leaf.move_half_to(&mut sibling);
            sibling.set_next_page_id(old_next);
            leaf.set_next_page_id(sibling_id);
        }
        let sibling_first_key = LeafPage::<N>::new(sibling_guard.get_data()).key_at(0);
        Ok((sibling_id, sibling_first_key))
    }

    /// `old_id` just split (or is the former root); `new_id` is its fresh
    /// right sibling carrying `key` as its smallest key. `parent_id` is
    /// `old_id`'s parent *before* the split (unaffected by it).
    fn insert_into_parent(
        &self,
        old_id: PageId,
        parent_id: PageId,
        key: GenericKey<N>,
        new_id: PageId,
    ) -> DbResult<()> {
        if parent_id == INVALID_PAGE_ID {
            let mut new_root_guard = self.bpm.new_page_guarded()?.upgrade_write();
            let new_root_id = new_root_guard.page_id();
            {
                let mut root = InternalPageMut::<N>::new(new_root_guard.get_data_mut());
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_id, &key, new_id);
            }
            drop(new_root_guard);
            self.set_parent_page_id(old_id, new_root_id)?;
            self.set_parent_page_id(new_id, new_root_id)?;
            *self.root_page_id.lock() = new_root_id;
            return self.update_root_page_id(false);
        }

        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let new_size = InternalPageMut::<N>::new(parent_guard.get_data_mut()).insert_node_after(old_id, key, new_id);
        self.set_parent_page_id(new_id, parent_id)?;

        if new_size > self.internal_max_size {
            let grandparent_id = InternalPage::<N>::new(parent_guard.get_data()).parent_page_id();
            let (sibling_id, sibling_key) = self.split_internal(&mut parent_guard)?;
            drop(parent_guard);
            self.insert_into_parent(parent_id, grandparent_id, sibling_key, sibling_id)?;
        }
        Ok(())
    }

    fn split_internal(&self, node_guard: &mut WritePageGuard) -> DbResult<(PageId, GenericKey<N>)> {
        let parent_id = InternalPage::<N>::new(node_guard.get_data()).parent_page_id();
        let mut sibling_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let sibling_id = sibling_guard.page_id();
        let moved = {
            let mut node = InternalPageMut::<N>::new(node_guard.get_data_mut());
            let mut sibling = InternalPageMut::<N>::new(sibling_guard.get_data_mut());
            sibling.init(sibling_id, parent_id, self.internal_max_size);
            node.move_half_to(&mut sibling)
        };
        let sibling_first_key = InternalPage::<N>::new(sibling_guard.get_data()).key_at(0);
        drop(sibling_guard);
        for child_id in moved {
            self.set_parent_page_id(child_id, sibling_id)?;
        }
        Ok((sibling_id, sibling_first_key))
    }

    // ---- deletion ---------------------------------------------------------

    pub fn remove(&self, key: &GenericKey<N>) -> DbResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let mut leaf_guard = self.find_leaf_for_write(key)?;
        let leaf_id = leaf_guard.page_id();

        if LeafPage::<N>::new(leaf_guard.get_data()).lookup(key).is_none() {
            return Ok(());
        }

        let parent_id = LeafPage::<N>::new(leaf_guard.get_data()).parent_page_id();
        let is_leftmost_entry = LeafPage::<N>::new(leaf_guard.get_data()).key_at(0) == *key;

        if is_leftmost_entry && parent_id != INVALID_PAGE_ID {
            let view = LeafPage::<N>::new(leaf_guard.get_data());
            if view.size() >= 2 {
                let new_routing_key = view.key_at(1);
                self.propagate_new_routing_key(leaf_id, parent_id, &new_routing_key)?;
            }
        }

        let new_size = LeafPageMut::<N>::new(leaf_guard.get_data_mut()).remove(key);

        if parent_id == INVALID_PAGE_ID {
            if new_size == 0 {
                drop(leaf_guard);
                self.bpm.delete_page(leaf_id)?;
                *self.root_page_id.lock() = INVALID_PAGE_ID;
                *self.last_leaf_page_id.lock() = INVALID_PAGE_ID;
                self.update_root_page_id(false)?;
            }
            return Ok(());
        }

        if new_size < self.leaf_min_size() {
            self.coalesce_or_redistribute_leaf(leaf_id, leaf_guard)?;
        }
        Ok(())
    }

    /// Walks from `parent_id` upward, rewriting the separator that routes to
    /// `child_id`'s subtree to `new_key`. While the rewritten separator is
    /// itself the dummy index-0 key of its page (meaning that page is also
    /// its own parent's leftmost child), the real routing key lives one
    /// level further up, so the walk continues; it stops the first time it
    /// rewrites a non-dummy entry.
    fn propagate_new_routing_key(&self, child_id: PageId, parent_id: PageId, new_key: &GenericKey<N>) -> DbResult<()> {
        let mut child_id = child_id;
        let mut parent_id = parent_id;
        loop {
            let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
            let Some(index) = InternalPage::<N>::new(parent_guard.get_data()).value_index(child_id) else {
                return Ok(());
            };
            InternalPageMut::<N>::new(parent_guard.get_data_mut()).set_key_at(index, new_key);
            if index != 0 {
                return Ok(());
            }
            let grandparent_id = InternalPage::<N>::new(parent_guard.get_data()).parent_page_id();
            if grandparent_id == INVALID_PAGE_ID {
                return Ok(());
            }
            child_id = parent_guard.page_id();
            parent_id = grandparent_id;
        }
    }

    fn coalesce_or_redistribute_leaf(&self, node_id: PageId, node_guard: WritePageGuard) -> DbResult<()> {
        let parent_id = LeafPage::<N>::new(node_guard.get_data()).parent_page_id();
        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let this_index = InternalPage::<N>::new(parent_guard.get_data())
            .value_index(node_id)
            .expect("leaf missing from its recorded parent");
        let sibling_index = if this_index == 0 { 1 } else { this_index - 1 };
        let sibling_id = InternalPage::<N>::new(parent_guard.get_data()).value_at(sibling_index);
        let sibling_guard = self.bpm.fetch_page_write(sibling_id)?;

        let (left_id, mut left_guard, right_id, mut right_guard) = if this_index < sibling_index {
            (node_id, node_guard, sibling_id, sibling_guard)
        } else {
            (sibling_id, sibling_guard, node_id, node_guard)
        };
        let right_index_in_parent = this_index.max(sibling_index);

        let (left_size, right_size) = {
            let l = LeafPage::<N>::new(left_guard.get_data());
            let r = LeafPage::<N>::new(right_guard.get_data());
            (l.size(), r.size())
        };

        if left_size + right_size <= self.leaf_max_size {
            {
                let mut right = LeafPageMut::<N>::new(right_guard.get_data_mut());
                let mut left = LeafPageMut::<N>::new(left_guard.get_data_mut());
                right.move_all_to(&mut left);
            }
            drop(right_guard);
            self.bpm.delete_page(right_id)?;
            drop(left_guard);
            let mut last = self.last_leaf_page_id.lock();
            if *last == right_id {
                *last = left_id;
            }
            drop(last);

            let parent_new_size = {
                let mut parent = InternalPageMut::<N>::new(parent_guard.get_data_mut());
                parent.remove(right_index_in_parent);
                parent.size()
            };
            return self.finish_ancestor_after_child_change(parent_id, parent_guard, parent_new_size);
        }

        if left_id == node_id {
            let mut right = LeafPageMut::<N>::new(right_guard.get_data_mut());
            let mut left = LeafPageMut::<N>::new(left_guard.get_data_mut());
            right.move_first_to_end_of(&mut left);
        } else {
            let mut left = LeafPageMut::<N>::new(left_guard.get_data_mut());
            let mut right = LeafPageMut::<N>::new(right_guard.get_data_mut());
            left.move_last_to_front_of(&mut right);
        }
        let new_separator = LeafPage::<N>::new(right_guard.get_data()).key_at(0);
        InternalPageMut::<N>::new(parent_guard.get_data_mut()).set_key_at(right_index_in_parent, &new_separator);
        Ok(())
    }

    fn coalesce_or_redistribute_internal(&self, node_id: PageId, node_guard: WritePageGuard) -> DbResult<()> {
        let parent_id = InternalPage::<N>::new(node_guard.get_data()).parent_page_id();
        let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
        let this_index = InternalPage::<N>::new(parent_guard.get_data())
            .value_index(node_id)
            .expect("internal node missing from its recorded parent");
        let sibling_index = if this_index == 0 { 1 } else { this_index - 1 };
        let sibling_id = InternalPage::<N>::new(parent_guard.get_data()).value_at(sibling_index);
        let sibling_guard = self.bpm.fetch_page_write(sibling_id)?;

        let (left_id, mut left_guard, right_id, mut right_guard) = if this_index < sibling_index {
            (node_id, node_guard, sibling_id, sibling_guard)
        } else {
            (sibling_id, sibling_guard, node_id, node_guard)
        };
        let right_index_in_parent = this_index.max(sibling_index);
        let middle_key = InternalPage::<N>::new(parent_guard.get_data()).key_at(right_index_in_parent);

        let (left_size, right_size) = {
            let l = InternalPage::<N>::new(left_guard.get_data());
            let r = InternalPage::<N>::new(right_guard.get_data());
            (l.size(), r.size())
        };

        if left_size + right_size <= self.internal_max_size {
            let moved = {
                let mut right = InternalPageMut::<N>::new(right_guard.get_data_mut());
                let mut left = InternalPageMut::<N>::new(left_guard.get_data_mut());
                right.move_all_to(&mut left, &middle_key)
            };
            drop(right_guard);
            self.bpm.delete_page(right_id)?;
            drop(left_guard);
            for child_id in moved {
                self.set_parent_page_id(child_id, left_id)?;
            }

            let parent_new_size = {
                let mut parent = InternalPageMut::<N>::new(parent_guard.get_data_mut());
                parent.remove(right_index_in_parent);
                parent.size()
            };
            return self.finish_ancestor_after_child_change(parent_id, parent_guard, parent_new_size);
        }

        let (moved_child, new_separator, new_parent_of_moved) = if left_id == node_id {
            let mut right = InternalPageMut::<N>::new(right_guard.get_data_mut());
            let mut left = InternalPageMut::<N>::new(left_guard.get_data_mut());
            let (child, sep) = right.move_first_to_end_of(&mut left, &middle_key);
            (child, sep, left_id)
        } else {
            let mut left = InternalPageMut::<N>::new(left_guard.get_data_mut());
            let mut right = InternalPageMut::<N>::new(right_guard.get_data_mut());
            let (child, sep) = left.move_last_to_front_of(&mut right, &middle_key);
            (child, sep, right_id)
        };
        drop(left_guard);
        drop(right_guard);
        self.set_parent_page_id(moved_child, new_parent_of_moved)?;
        InternalPageMut::<N>::new(parent_guard.get_data_mut()).set_key_at(right_index_in_parent, &new_separator);
        Ok(())
    }

    /// After a child merge shrank `parent_id`'s size, either collapses it
    /// (it is the root and now has a single child) or recurses the same
    /// coalesce-or-redistribute check one level up.
    fn finish_ancestor_after_child_change(
        &self,
        parent_id: PageId,
        parent_guard: WritePageGuard,
        parent_new_size: usize,
    ) -> DbResult<()> {
        let grandparent_id = InternalPage::<N>::new(parent_guard.get_data()).parent_page_id();
        if grandparent_id == INVALID_PAGE_ID {
            if parent_new_size == 1 {
                return self.adjust_root_internal(parent_id, parent_guard);
            }
            return Ok(());
        }
        if parent_new_size < self.internal_min_size() {
            self.coalesce_or_redistribute_internal(parent_id, parent_guard)
        } else {
            Ok(())
        }
    }

    /// Collapses a root internal page down to its sole remaining child,
    /// which becomes the new root.
    fn adjust_root_internal(&self, root_id: PageId, mut root_guard: WritePageGuard) -> DbResult<()> {
        let only_child = InternalPageMut::<N>::new(root_guard.get_data_mut()).remove_and_return_only_child();
        drop(root_guard);
        self.bpm.delete_page(root_id)?;
        self.set_parent_page_id(only_child, INVALID_PAGE_ID)?;
        *self.root_page_id.lock() = only_child;
        self.update_root_page_id(false)
    }

    // ---- iteration & teardown -------------------------------------------

    pub fn begin(&self) -> DbResult<IndexIterator<N>> {
        let root_id = self.root_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(IndexIterator::exhausted(self.bpm.clone()));
        }
        let guard = self.find_leftmost_leaf_read(root_id)?;
        Ok(IndexIterator::new(self.bpm.clone(), guard, 0))
    }

    pub fn begin_at(&self, key: &GenericKey<N>) -> DbResult<IndexIterator<N>> {
        if self.is_empty() {
            return Ok(IndexIterator::exhausted(self.bpm.clone()));
        }
        let guard = self.find_leaf_for_read(key)?;
        let slot = LeafPage::<N>::new(guard.get_data()).key_index(key);
        Ok(IndexIterator::new(self.bpm.clone(), guard, slot))
    }

    pub fn end(&self) -> IndexIterator<N> {
        IndexIterator::exhausted(self.bpm.clone())
    }

    /// Frees every page of this tree and removes it from the index-roots
    /// page. The tree must not be used afterward.
    pub fn destroy(&self) -> DbResult<()> {
        let root_id = self.root_id();
        if root_id != INVALID_PAGE_ID {
            self.destroy_subtree(root_id)?;
        }
        *self.root_page_id.lock() = INVALID_PAGE_ID;
        *self.last_leaf_page_id.lock() = INVALID_PAGE_ID;
        let mut guard = self.bpm.fetch_page_write(INDEX_ROOTS_PAGE_ID)?;
        IndexRootsPageMut::new(guard.get_data_mut()).delete(self.index_id);
        Ok(())
    }

    fn destroy_subtree(&self, page_id: PageId) -> DbResult<()> {
        let children: Vec<PageId> = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let view = InternalPage::<N>::new(guard.get_data());
            if view.is_leaf_page() {
                Vec::new()
            } else {
                (0..view.size()).map(|i| view.value_at(i)).collect()
            }
        };
        for child in children {
            self.destroy_subtree(child)?;
        }
        self.bpm.delete_page(page_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::buffer::replacer::{ReplacerPolicy, StorageConfig};
    use crate::storage::disk::disk_manager::DiskManager;

    fn temp_tree(leaf_max: usize, internal_max: usize) -> (TempDir, BPlusTree<8>) {
        let dir = TempDir::new().unwrap();
        let db_file = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_file.to_str().unwrap()).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(StorageConfig::new(64, ReplacerPolicy::Lru), disk_manager));
        let tree = BPlusTree::<8>::new(1, bpm, Some(leaf_max), Some(internal_max)).unwrap();
        (dir, tree)
    }

    fn k(v: i64) -> GenericKey<8> {
        GenericKey::from_i64(v)
    }

    #[test]
    fn insert_duplicate_key_is_rejected() {
        let (_dir, tree) = temp_tree(4, 4);
        assert!(tree.insert(k(1), RowId::new(1, 0)).unwrap());
        assert!(!tree.insert(k(1), RowId::new(1, 1)).unwrap());
        assert_eq!(tree.get_value(&k(1)).unwrap(), Some(RowId::new(1, 0)));
    }

    /// Leaf capacity 4: inserting keys 1..=5 in order overflows the root
    /// leaf on the fifth insert and splits it into two leaves. Per spec.md
    /// §8 scenario 3, the split leaves `{1,2}` on the left and `{3,4,5}` on
    /// the right, with a new internal root holding the single key 3.
    #[test]
    fn fifth_insert_splits_the_root_leaf() {
        let (_dir, tree) = temp_tree(4, 4);
        for i in 1..=5 {
            assert!(tree.insert(k(i), RowId::new(i as i32, 0)).unwrap());
        }
        for i in 1..=5 {
            assert_eq!(tree.get_value(&k(i)).unwrap(), Some(RowId::new(i as i32, 0)));
        }
        let collected: Vec<_> = tree.begin().unwrap().map(|(key, _)| key).collect();
        assert_eq!(collected, (1..=5).map(k).collect::<Vec<_>>());

        let root_id = tree.root_id();
        let root_guard = tree.bpm.fetch_page_read(root_id).unwrap();
        let root = InternalPage::<8>::new(root_guard.get_data());
        assert!(!root.is_leaf_page());
        assert_eq!(root.size(), 2);
        assert_eq!(root.key_at(1), k(3));
        let (left_id, right_id) = (root.value_at(0), root.value_at(1));
        drop(root_guard);

        let left_guard = tree.bpm.fetch_page_read(left_id).unwrap();
        let left = LeafPage::<8>::new(left_guard.get_data());
        assert_eq!((0..left.size()).map(|i| left.key_at(i)).collect::<Vec<_>>(), vec![k(1), k(2)]);
        drop(left_guard);

        let right_guard = tree.bpm.fetch_page_read(right_id).unwrap();
        let right = LeafPage::<8>::new(right_guard.get_data());
        assert_eq!(
            (0..right.size()).map(|i| right.key_at(i)).collect::<Vec<_>>(),
            vec![k(3), k(4), k(5)]
        );
    }

    #[test]
    fn shuffled_inserts_iterate_in_sorted_order() {
        let (_dir, tree) = temp_tree(4, 4);
        for i in [7, 2, 9, 1, 5, 3, 8, 4, 6, 0] {
            assert!(tree.insert(k(i), RowId::new(i as i32, 0)).unwrap());
        }
        let collected: Vec<_> = tree.begin().unwrap().map(|(key, _)| key).collect();
        assert_eq!(collected, (0..=9).map(k).collect::<Vec<_>>());
    }

    #[test]
    fn removing_every_key_empties_the_tree() {
        let (_dir, tree) = temp_tree(4, 4);
        for i in 1..=10 {
            tree.insert(k(i), RowId::new(i as i32, 0)).unwrap();
        }
        for i in 1..=10 {
            tree.remove(&k(i)).unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.get_value(&k(1)).unwrap(), None);
        assert!(tree.begin().unwrap().next().is_none());
    }

    #[test]
    fn deletes_trigger_merge_and_adjust_root() {
        let (_dir, tree) = temp_tree(4, 4);
        for i in 1..=9 {
            tree.insert(k(i), RowId::new(i as i32, 0)).unwrap();
        }
        for i in [2, 3, 4, 5, 6, 7] {
            tree.remove(&k(i)).unwrap();
        }
        let remaining: Vec<_> = tree.begin().unwrap().map(|(key, _)| key).collect();
        assert_eq!(remaining, vec![k(1), k(8), k(9)]);
        for i in [1, 8, 9] {
            assert_eq!(tree.get_value(&k(i)).unwrap(), Some(RowId::new(i as i32, 0)));
        }
    }

    #[test]
    fn begin_at_skips_to_the_requested_key() {
        let (_dir, tree) = temp_tree(4, 4);
        for i in 1..=10 {
            tree.insert(k(i), RowId::new(i as i32, 0)).unwrap();
        }
        let collected: Vec<_> = tree.begin_at(&k(5)).unwrap().map(|(key, _)| key).collect();
        assert_eq!(collected, (5..=10).map(k).collect::<Vec<_>>());
    }

    #[test]
    fn destroy_clears_the_index_roots_entry() {
        let (_dir, dir_bpm) = {
            let dir = TempDir::new().unwrap();
            let db_file = dir.path().join("test.db");
            let disk_manager = DiskManager::new(db_file.to_str().unwrap()).unwrap();
            (dir, Arc::new(BufferPoolManager::new(StorageConfig::new(64, ReplacerPolicy::Lru), disk_manager)))
        };
        let tree = BPlusTree::<8>::new(7, dir_bpm.clone(), Some(4), Some(4)).unwrap();
        for i in 1..=5 {
            tree.insert(k(i), RowId::new(i as i32, 0)).unwrap();
        }
        tree.destroy().unwrap();

        let reopened = BPlusTree::<8>::new(7, dir_bpm, Some(4), Some(4)).unwrap();
        assert!(reopened.is_empty());
    }
}
