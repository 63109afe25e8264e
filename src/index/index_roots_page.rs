//! The well-known page at `INDEX_ROOTS_PAGE_ID` holding `index_id -> root
//! page_id`. One per database file, shared by every index on it.

use crate::common::config::PageId;

const COUNT_LEN: usize = 4;
const ENTRY_LEN: usize = 4 + 4; // index_id(u32) + root_page_id(i32)

pub fn index_roots_capacity(page_size: usize) -> usize {
    (page_size - COUNT_LEN) / ENTRY_LEN
}

pub struct IndexRootsPage<'a> {
    bytes: &'a [u8],
}

impl<'a> IndexRootsPage<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn count(&self) -> usize {
        u32::from_le_bytes(self.bytes[0..COUNT_LEN].try_into().unwrap()) as usize
    }

    fn entry(&self, i: usize) -> (u32, PageId) {
        let off = COUNT_LEN + i * ENTRY_LEN;
        let index_id = u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap());
        let root_page_id = PageId::from_le_bytes(self.bytes[off + 4..off + 8].try_into().unwrap());
        (index_id, root_page_id)
    }

    pub fn get_root_id(&self, index_id: u32) -> Option<PageId> {
        (0..self.count())
            .map(|i| self.entry(i))
            .find(|&(id, _)| id == index_id)
            .map(|(_, root)| root)
    }
}

pub struct IndexRootsPageMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> IndexRootsPageMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn view(&self) -> IndexRootsPage<'_> {
        IndexRootsPage::new(self.bytes)
    }

    fn count(&self) -> usize {
        self.view().count()
    }

    fn set_count(&mut self, count: usize) {
        self.bytes[0..COUNT_LEN].copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn write_entry(&mut self, i: usize, index_id: u32, root_page_id: PageId) {
        let off = COUNT_LEN + i * ENTRY_LEN;
        self.bytes[off..off + 4].copy_from_slice(&index_id.to_le_bytes());
        self.bytes[off + 4..off + 8].copy_from_slice(&root_page_id.to_le_bytes());
    }

    /// Inserts a fresh `(index_id, root_page_id)` record (a brand-new
    /// tree). Overwrites in place if `index_id` is already present.
    pub fn insert(&mut self, index_id: u32, root_page_id: PageId) {
        let count = self.count();
        for i in 0..count {
            if self.view().entry(i).0 == index_id {
                self.write_entry(i, index_id, root_page_id);
                return;
            }
        }
        self.write_entry(count, index_id, root_page_id);
        self.set_count(count + 1);
    }

    /// Updates an existing record's root page id. No-op if absent.
    pub fn update(&mut self, index_id: u32, root_page_id: PageId) {
        let count = self.count();
        for i in 0..count {
            if self.view().entry(i).0 == index_id {
                self.write_entry(i, index_id, root_page_id);
                return;
            }
        }
    }

    /// Removes `index_id`'s record, compacting the array. No-op if absent.
    pub fn delete(&mut self, index_id: u32) {
        let count = self.count();
        let Some(pos) = (0..count).find(|&i| self.view().entry(i).0 == index_id) else {
            return;
        };
        for i in pos..count - 1 {
            let (id, root) = self.view().entry(i + 1);
            self.write_entry(i, id, root);
        }
        self.set_count(count - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn insert_update_delete_round_trip() {
        let mut buf = [0u8; PAGE_SIZE];
        let mut roots = IndexRootsPageMut::new(&mut buf);
        roots.insert(1, 10);
        roots.insert(2, 20);
        assert_eq!(roots.view().get_root_id(1), Some(10));
        roots.update(1, 11);
        assert_eq!(roots.view().get_root_id(1), Some(11));
        roots.delete(1);
        assert_eq!(roots.view().get_root_id(1), None);
        assert_eq!(roots.view().get_root_id(2), Some(20));
    }
}
