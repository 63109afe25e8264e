//! Leaf node layout: common header, `next_page_id`, then `size` sorted
//! `(key, row_id)` pairs. `move_half_to`'s split arithmetic always
//! re-establishes `left.len() + right.len() == original_len`, checked with
//! a `debug_assert!` at every split site.

use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::index::b_plus_tree_page::{min_size, CommonHeader, IndexPageType, COMMON_HEADER_LEN};
use crate::index::generic_key::GenericKey;
use crate::index::row_id::{RowId, ROW_ID_SIZE};

const NEXT_PAGE_ID_LEN: usize = 4;
pub const LEAF_HEADER_LEN: usize = COMMON_HEADER_LEN + NEXT_PAGE_ID_LEN;

fn entry_len(key_size: usize) -> usize {
    key_size + ROW_ID_SIZE
}

/// Largest `max_size` a leaf of this key width can physically hold.
pub fn leaf_capacity(page_size: usize, key_size: usize) -> usize {
    (page_size - LEAF_HEADER_LEN) / entry_len(key_size)
}

/// Read-only view over a leaf page's bytes, usable under a shared latch.
pub struct LeafPage<'a, const N: usize> {
    bytes: &'a [u8],
}

impl<'a, const N: usize> LeafPage<'a, N> {
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

    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_bytes(
            self.bytes[COMMON_HEADER_LEN..COMMON_HEADER_LEN + NEXT_PAGE_ID_LEN]
                .try_into()
                .unwrap(),
        )
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_LEN + index * entry_len(N)
    }

    pub fn key_at(&self, index: usize) -> GenericKey<N> {
        let off = self.entry_offset(index);
        GenericKey::from_slice(&self.bytes[off..off + N])
    }

    pub fn value_at(&self, index: usize) -> RowId {
        let off = self.entry_offset(index) + N;
        RowId::from_bytes(&self.bytes[off..off + ROW_ID_SIZE])
    }

    /// First index `i` such that `key_at(i) >= key`.
    pub fn key_index(&self, key: &GenericKey<N>) -> usize {
        let mut lo = 0usize;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if &self.key_at(mid) < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup(&self, key: &GenericKey<N>) -> Option<RowId> {
        let index = self.key_index(key);
        if index < self.size() && &self.key_at(index) == key {
            Some(self.value_at(index))
        } else {
            None
        }
    }

    /// Whether `key` falls in this leaf's covered range: used by the
    /// hot-path shortcut to decide if a full root descent can be skipped.
    pub fn covers(&self, key: &GenericKey<N>) -> bool {
        if self.size() == 0 {
            return false;
        }
        let first = self.key_at(0);
        let last = self.key_at(self.size() - 1);
        if key < &first {
            return false;
        }
        if key <= &last {
            return true;
        }
        self.next_page_id() == INVALID_PAGE_ID
    }
}

/// Mutable view over a leaf page's bytes, usable under an exclusive latch.
pub struct LeafPageMut<'a, const N: usize> {
    bytes: &'a mut [u8],
}

impl<'a, const N: usize> LeafPageMut<'a, N> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn view(&self) -> LeafPage<'_, N> {
        LeafPage::new(self.bytes)
    }

    fn header(&self) -> CommonHeader {
        CommonHeader::read(self.bytes)
    }

    fn set_header(&mut self, header: CommonHeader) {
        header.write(self.bytes);
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        self.set_header(CommonHeader {
            page_type: IndexPageType::Leaf,
            page_id,
            parent_page_id: parent_id,
            size: 0,
            max_size: max_size as u32,
        });
        self.set_next_page_id(INVALID_PAGE_ID);
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

    pub fn next_page_id(&self) -> PageId {
        self.view().next_page_id()
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.bytes[COMMON_HEADER_LEN..COMMON_HEADER_LEN + NEXT_PAGE_ID_LEN]
            .copy_from_slice(&next_page_id.to_le_bytes());
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_LEN + index * entry_len(N)
    }

    fn write_entry(&mut self, index: usize, key: &GenericKey<N>, value: RowId) {
        let off = self.entry_offset(index);
        self.bytes[off..off + N].copy_from_slice(key.as_bytes());
        self.bytes[off + N..off + N + ROW_ID_SIZE].copy_from_slice(&value.to_bytes());
    }

    fn copy_entry_within(&mut self, from: usize, to: usize) {
        let key = self.view().key_at(from);
        let value = self.view().value_at(from);
        self.write_entry(to, &key, value);
    }

    /// Inserts `(key, value)` in sorted order. Returns the size after
    /// insertion. Caller must have already confirmed `key` is absent.
    pub fn insert(&mut self, key: GenericKey<N>, value: RowId) -> usize {
        let index = self.view().key_index(&key);
        let size = self.size();
        let mut i = size;
        while i > index {
            self.copy_entry_within(i - 1, i);
            i -= 1;
        }
        self.write_entry(index, &key, value);
        self.set_size(size + 1);
        self.size()
    }

    /// Removes `key` if present. Returns the size after removal.
    pub fn remove(&mut self, key: &GenericKey<N>) -> usize {
        let index = self.view().key_index(key);
        let size = self.size();
        if index < size && &self.view().key_at(index) == key {
            for i in index..size - 1 {
                self.copy_entry_within(i + 1, i);
            }
            self.set_size(size - 1);
        }
        self.size()
    }

    /// Moves the upper half of this leaf's entries into `recipient`, which
    /// must be empty. `self.len() + recipient.len() == original_len` holds
    /// after the split — the arithmetic the original's off-by-one broke.
    /// `self` keeps `size/2` (floor) entries, `recipient` gets the rest —
    /// matching `original_source`'s `MoveHalfTo` split point and spec.md
    /// §8 scenario 3 (`{1,2,3,4,5}` splits into `{1,2}` / `{3,4,5}`).
    pub fn move_half_to(&mut self, recipient: &mut LeafPageMut<'_, N>) {
        debug_assert_eq!(recipient.size(), 0);
        let size = self.size();
        let left_len = size / 2;
        let right_len = size - left_len;
        for i in 0..right_len {
            let key = self.view().key_at(left_len + i);
            let value = self.view().value_at(left_len + i);
            recipient.write_entry(i, &key, value);
        }
        recipient.set_size(right_len);
        self.set_size(left_len);
        debug_assert_eq!(self.size() + recipient.size(), size);
    }

    /// Moves every entry of `self` onto the end of `recipient` (merge),
    /// leaving `self` empty. `recipient` is `self`'s left sibling, so it
    /// inherits `self`'s `next_page_id`, splicing `self` out of the chain.
    pub fn move_all_to(&mut self, recipient: &mut LeafPageMut<'_, N>) {
        let base = recipient.size();
        let size = self.size();
        for i in 0..size {
            let key = self.view().key_at(i);
            let value = self.view().value_at(i);
            recipient.write_entry(base + i, &key, value);
        }
        recipient.set_size(base + size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPageMut<'_, N>) {
        let key = self.view().key_at(0);
        let value = self.view().value_at(0);
        let base = recipient.size();
        recipient.write_entry(base, &key, value);
        recipient.set_size(base + 1);
        let size = self.size();
        for i in 0..size - 1 {
            self.copy_entry_within(i + 1, i);
        }
        self.set_size(size - 1);
    }

    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPageMut<'_, N>) {
        let size = self.size();
        let key = self.view().key_at(size - 1);
        let value = self.view().value_at(size - 1);
        let rsize = recipient.size();
        let mut i = rsize;
        while i > 0 {
            recipient.copy_entry_within(i - 1, i);
            i -= 1;
        }
        recipient.write_entry(0, &key, value);
        recipient.set_size(rsize + 1);
        self.set_size(size - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    fn blank_leaf(max_size: usize) -> [u8; PAGE_SIZE] {
        let mut buf = [0u8; PAGE_SIZE];
        LeafPageMut::<8>::new(&mut buf).init(1, INVALID_PAGE_ID, max_size);
        buf
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let mut buf = blank_leaf(4);
        let mut leaf = LeafPageMut::<8>::new(&mut buf);
        for k in [3, 1, 4, 2] {
            leaf.insert(GenericKey::from_i64(k), RowId::new(k as i32, 0));
        }
        let view = leaf.view();
        let keys: Vec<_> = (0..view.size()).map(|i| view.key_at(i)).collect();
        assert_eq!(
            keys,
            vec![
                GenericKey::from_i64(1),
                GenericKey::from_i64(2),
                GenericKey::from_i64(3),
                GenericKey::from_i64(4)
            ]
        );
    }

    #[test]
    fn split_preserves_total_entry_count() {
        let mut buf = blank_leaf(4);
        let mut leaf = LeafPageMut::<8>::new(&mut buf);
        for k in 1..=5 {
            leaf.insert(GenericKey::from_i64(k), RowId::new(k as i32, 0));
        }
        assert_eq!(leaf.size(), 5);

        let mut sibling_buf = [0u8; PAGE_SIZE];
        let mut sibling = LeafPageMut::<8>::new(&mut sibling_buf);
        sibling.init(2, INVALID_PAGE_ID, 4);
        leaf.move_half_to(&mut sibling);

        assert_eq!(leaf.size() + sibling.size(), 5);
        assert_eq!(leaf.size(), 2);
        assert_eq!(sibling.size(), 3);
        assert_eq!(sibling.view().key_at(0), GenericKey::from_i64(3));
    }

    #[test]
    fn remove_then_lookup_reports_absent() {
        let mut buf = blank_leaf(4);
        let mut leaf = LeafPageMut::<8>::new(&mut buf);
        leaf.insert(GenericKey::from_i64(1), RowId::new(1, 0));
        leaf.remove(&GenericKey::from_i64(1));
        assert_eq!(leaf.view().lookup(&GenericKey::from_i64(1)), None);
    }
}
