//! Internal node layout: common header, then `size` sorted
//! `(key, child_page_id)` pairs. Index 0's key is a dummy, never compared —
//! the child at index 0 covers every key less than `key_at(1)`.
//!
//! The entry-shuffling methods here never reach into the buffer pool
//! themselves to rewrite a moved child's `parent_page_id` — they return the
//! list of child page ids whose parent changed, and the caller
//! (`b_plus_tree.rs`, which already holds the buffer pool handle) persists
//! the new parent pointer through a page guard.

use crate::common::config::PageId;
use crate::index::b_plus_tree_page::{min_size, CommonHeader, IndexPageType, COMMON_HEADER_LEN};
use crate::index::generic_key::GenericKey;

const CHILD_ID_LEN: usize = 4;

fn entry_len(key_size: usize) -> usize {
    key_size + CHILD_ID_LEN
}

pub fn internal_capacity(page_size: usize, key_size: usize) -> usize {
    (page_size - COMMON_HEADER_LEN) / entry_len(key_size)
}

pub struct InternalPage<'a, const N: usize> {
    bytes: &'a [u8],
}

impl<'a, const N: usize> InternalPage<'a, N> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn header(&self) -> CommonHeader {
        CommonHeader::read(self.bytes)
    }

    pub fn is_leaf_page(&self) -> bool {
        self.header().page_type == IndexPageType::Leaf
    }

    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    pub fn parent_page_id(&self) -> PageId {
        self.header().parent_page_id
    }

    pub fn size(&self) -> usize {
        self.header().size as usize
    }

    pub fn max_size(&self) -> usize {
        self.header().max_size as usize
    }

    pub fn min_size(&self) -> usize {
        min_size(self.header().max_size as u32) as usize
    }

    fn entry_offset(&self, index: usize) -> usize {
        COMMON_HEADER_LEN + index * entry_len(N)
    }

    pub fn key_at(&self, index: usize) -> GenericKey<N> {
        let off = self.entry_offset(index);
        GenericKey::from_slice(&self.bytes[off..off + N])
    }

    pub fn value_at(&self, index: usize) -> PageId {
        let off = self.entry_offset(index) + N;
        PageId::from_le_bytes(self.bytes[off..off + CHILD_ID_LEN].try_into().unwrap())
    }

    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    /// Greatest index `i` with `key_at(i) <= key`; the child subtree to
    /// descend into. Index 0's key is never compared.
    pub fn lookup(&self, key: &GenericKey<N>) -> PageId {
        let mut index = 1usize;
        while index < self.size() && self.key_at(index) <= *key {
            index += 1;
        }
        self.value_at(index - 1)
    }
}

pub struct InternalPageMut<'a, const N: usize> {
    bytes: &'a mut [u8],
}

impl<'a, const N: usize> InternalPageMut<'a, N> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn view(&self) -> InternalPage<'_, N> {
        InternalPage::new(self.bytes)
    }

    fn header(&self) -> CommonHeader {
        CommonHeader::read(self.bytes)
    }

    fn set_header(&mut self, header: CommonHeader) {
        header.write(self.bytes);
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        self.set_header(CommonHeader {
            page_type: IndexPageType::Internal,
            page_id,
            parent_page_id: parent_id,
            size: 0,
            max_size: max_size as u32,
        });
    }

    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    pub fn size(&self) -> usize {
        self.header().size as usize
    }

    pub fn max_size(&self) -> usize {
        self.header().max_size as usize
    }

    pub fn set_size(&mut self, size: usize) {
        let mut h = self.header();
        h.size = size as u32;
        self.set_header(h);
    }

    pub fn set_parent_page_id(&mut self, parent_id: PageId) {
        let mut h = self.header();
        h.parent_page_id = parent_id;
        self.set_header(h);
    }

    pub fn set_key_at(&mut self, index: usize, key: &GenericKey<N>) {
        let off = self.entry_offset(index);
        self.bytes[off..off + N].copy_from_slice(key.as_bytes());
    }

    fn entry_offset(&self, index: usize) -> usize {
        COMMON_HEADER_LEN + index * entry_len(N)
    }

    fn write_entry(&mut self, index: usize, key: &GenericKey<N>, value: PageId) {
        let off = self.entry_offset(index);
        self.bytes[off..off + N].copy_from_slice(key.as_bytes());
        self.bytes[off + N..off + N + CHILD_ID_LEN].copy_from_slice(&value.to_le_bytes());
    }

    fn copy_entry_within(&mut self, from: usize, to: usize) {
        let key = self.view().key_at(from);
        let value = self.view().value_at(from);
        self.write_entry(to, &key, value);
    }

    /// Sets up a brand-new root with exactly two children, `old_value` at
    /// index 0 (whose key is a dummy) and `new_value` at index 1.
    pub fn populate_new_root(&mut self, old_value: PageId, new_key: &GenericKey<N>, new_value: PageId) {
        self.set_size(2);
        self.write_entry(0, new_key, old_value);
        self.write_entry(1, new_key, new_value);
    }

    /// Inserts `(new_key, new_value)` directly after the entry whose value
    /// is `old_value`. Returns the size after insertion.
    pub fn insert_node_after(&mut self, old_value: PageId, new_key: GenericKey<N>, new_value: PageId) -> usize {
        let Some(index) = self.view().value_index(old_value) else {
            return self.size();
        };
        let size = self.size();
        let mut i = size;
        while i > index + 1 {
            self.copy_entry_within(i - 1, i);
            i -= 1;
        }
        self.write_entry(index + 1, &new_key, new_value);
        self.set_size(size + 1);
        self.size()
    }

    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        for i in index..size - 1 {
            self.copy_entry_within(i + 1, i);
        }
        self.set_size(size - 1);
    }

    /// Removes the sole remaining entry (called only from `AdjustRoot`) and
    /// returns its child page id.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        let only_child = self.view().value_at(0);
        self.set_size(0);
        only_child
    }

    /// Moves the upper half of this node's entries to `recipient`. Returns
    /// the page ids of the moved children, whose `parent_page_id` the
    /// caller must rewrite to `recipient`'s page id. `self` keeps `size/2`
    /// (floor) entries, `recipient` gets the rest, matching the split point
    /// `leaf_page::move_half_to` uses.
    pub fn move_half_to(&mut self, recipient: &mut InternalPageMut<'_, N>) -> Vec<PageId> {
        debug_assert_eq!(recipient.size(), 0);
        let size = self.size();
        let left_len = size / 2;
        let right_len = size - left_len;
        let mut moved = Vec::with_capacity(right_len);
        for i in 0..right_len {
            let key = self.view().key_at(left_len + i);
            let value = self.view().value_at(left_len + i);
            recipient.write_entry(i, &key, value);
            moved.push(value);
        }
        recipient.set_size(right_len);
        self.set_size(left_len);
        debug_assert_eq!(self.size() + recipient.size(), size);
        moved
    }

    /// Moves every entry onto `recipient`'s tail, placing `middle_key` at
    /// the junction (the separator the parent used to route between the
    /// two nodes, which must survive the merge as a real comparable key
    /// now that it is no longer index 0 of a page). Returns the moved
    /// children's page ids.
    pub fn move_all_to(
        &mut self,
        recipient: &mut InternalPageMut<'_, N>,
        middle_key: &GenericKey<N>,
    ) -> Vec<PageId> {
        let base = recipient.size();
        let size = self.size();
        let mut moved = Vec::with_capacity(size);
        for i in 0..size {
            let key = if i == 0 { *middle_key } else { self.view().key_at(i) };
            let value = self.view().value_at(i);
            recipient.write_entry(base + i, &key, value);
            moved.push(value);
        }
        recipient.set_size(base + size);
        self.set_size(0);
        moved
    }

    /// Moves the first entry (index 0, `self`'s leftmost child) to the end
    /// of `recipient`, which sits to `self`'s left. `middle_key` — the old
    /// parent separator between `recipient` and `self` — becomes the moved
    /// entry's real key (it is no longer at index 0, so it is no longer a
    /// dummy). Returns the moved child's page id and the new separator the
    /// caller must write into the parent between `recipient` and `self`:
    /// `self`'s own new leftmost key, left dummy-ignored at `self`'s index
    /// 0 but real once read out before the shift.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPageMut<'_, N>,
        middle_key: &GenericKey<N>,
    ) -> (PageId, GenericKey<N>) {
        let value = self.view().value_at(0);
        let base = recipient.size();
        recipient.write_entry(base, middle_key, value);
        recipient.set_size(base + 1);
        let new_separator = self.view().key_at(1);
        let size = self.size();
        for i in 0..size - 1 {
            self.copy_entry_within(i + 1, i);
        }
        self.set_size(size - 1);
        (value, new_separator)
    }

    /// Moves the last entry to the front of `recipient`, which sits to
    /// `self`'s right. The moved entry becomes `recipient`'s new dummy
    /// index-0 key; `recipient`'s old index-0 entry is shifted to index 1
    /// and `middle_key` — the old parent separator between `self` and
    /// `recipient` — becomes its real key. Returns the moved child's page
    /// id and the new separator the caller must write into the parent
    /// between `self` and `recipient`: the moved entry's own old key (the
    /// smallest key of the subtree it roots).
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPageMut<'_, N>,
        middle_key: &GenericKey<N>,
    ) -> (PageId, GenericKey<N>) {
        let size = self.size();
        let value = self.view().value_at(size - 1);
        let new_separator = self.view().key_at(size - 1);
        let rsize = recipient.size();
        let mut i = rsize;
        while i > 0 {
            recipient.copy_entry_within(i - 1, i);
            i -= 1;
        }
        recipient.write_entry(0, &new_separator, value);
        if rsize > 0 {
            recipient.set_key_at(1, middle_key);
        }
        recipient.set_size(rsize + 1);
        self.set_size(size - 1);
        (value, new_separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{PAGE_SIZE, INVALID_PAGE_ID};

    #[test]
    fn populate_new_root_has_two_children() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut root = InternalPageMut::<8>::new(&mut buf);
        root.init(1, INVALID_PAGE_ID, 4);
        root.populate_new_root(10, &GenericKey::from_i64(5), 20);
        assert_eq!(root.size(), 2);
        assert_eq!(root.view().value_at(0), 10);
        assert_eq!(root.view().value_at(1), 20);
        assert_eq!(root.view().lookup(&GenericKey::from_i64(3)), 10);
        assert_eq!(root.view().lookup(&GenericKey::from_i64(5)), 20);
        assert_eq!(root.view().lookup(&GenericKey::from_i64(99)), 20);
    }

    #[test]
    fn insert_node_after_preserves_order() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut root = InternalPageMut::<8>::new(&mut buf);
        root.init(1, INVALID_PAGE_ID, 4);
        root.populate_new_root(10, &GenericKey::from_i64(5), 20);
        root.insert_node_after(20, GenericKey::from_i64(8), 30);
        assert_eq!(root.size(), 3);
        assert_eq!(root.view().value_at(2), 30);
        assert_eq!(root.view().key_at(2), GenericKey::from_i64(8));
    }
}
