//! RAII wrappers around a pinned `Page`.
//!
//! `BasicPageGuard` only owns the pin: dropping it unpins the page but takes
//! no latch. `ReadPageGuard`/`WritePageGuard` additionally hold the page's
//! latch for their whole lifetime, acquired once at construction — never
//! across a disk I/O, since by construction time the fetch/new that may have
//! touched disk has already completed.

use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, MappedRwLockReadGuard, RawRwLock};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::page::page::{Page, PageInner};

pub struct BasicPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
    /// Cleared by `upgrade_read`/`upgrade_write` so the moved-from guard's
    /// `Drop` does not also unpin.
    released: bool,
}

impl BasicPageGuard {
    pub fn new(bpm: Arc<BufferPoolManager>, page: Page) -> BasicPageGuard {
        Self {
            bpm,
            page,
            is_dirty: false,
            released: false,
        }
    }

    /// Upgrades to a `ReadPageGuard`. The page is not evicted or re-pinned
    /// during the upgrade; this guard is consumed.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        self.released = true;
        ReadPageGuard::from_basic(self.bpm.clone(), self.page.clone(), self.is_dirty)
    }

    /// Upgrades to a `WritePageGuard`, same contract as `upgrade_read`.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        self.released = true;
        WritePageGuard::from_basic(self.bpm.clone(), self.page.clone(), self.is_dirty)
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id()
    }

    pub fn get_data(&self) -> MappedRwLockReadGuard<'_, [u8; crate::common::config::PAGE_SIZE]> {
        self.page.get_data()
    }

    pub fn get_data_mut(
        &mut self,
    ) -> parking_lot::MappedRwLockWriteGuard<'_, [u8; crate::common::config::PAGE_SIZE]> {
        self.is_dirty = true;
        self.page.get_mut_data()
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.bpm.unpin_page(self.page.get_page_id(), self.is_dirty);
    }
}

pub struct ReadPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    latch: Option<ArcRwLockReadGuard<RawRwLock, PageInner>>,
    is_dirty: bool,
}

impl ReadPageGuard {
    pub fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        Self::from_basic(bpm, page, false)
    }

    /// `is_dirty` carries over a mutation made through a `BasicPageGuard`
    /// before it was upgraded — a read guard cannot mutate further, but it
    /// must not silently drop a write that already happened.
    fn from_basic(bpm: Arc<BufferPoolManager>, page: Page, is_dirty: bool) -> Self {
        let latch = page.latch_read();
        Self {
            bpm,
            page,
            latch: Some(latch),
            is_dirty,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id()
    }

    pub fn get_data(&self) -> &[u8; crate::common::config::PAGE_SIZE] {
        &self
            .latch
            .as_ref()
            .expect("read guard used after release")
            .data
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        if let Some(latch) = self.latch.take() {
            drop(latch);
            self.bpm.unpin_page(self.page.get_page_id(), self.is_dirty);
        }
    }
}

pub struct WritePageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    latch: Option<ArcRwLockWriteGuard<RawRwLock, PageInner>>,
}

impl WritePageGuard {
    pub fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        Self::from_basic(bpm, page, false)
    }

    fn from_basic(bpm: Arc<BufferPoolManager>, page: Page, _is_dirty: bool) -> Self {
        let latch = page.latch_write();
        Self {
            bpm,
            page,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id()
    }

    pub fn get_data(&self) -> &[u8; crate::common::config::PAGE_SIZE] {
        &self
            .latch
            .as_ref()
            .expect("write guard used after release")
            .data
    }

    pub fn get_data_mut(&mut self) -> &mut [u8; crate::common::config::PAGE_SIZE] {
        &mut self
            .latch
            .as_mut()
            .expect("write guard used after release")
            .data
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        if let Some(latch) = self.latch.take() {
            drop(latch);
            self.bpm.unpin_page(self.page.get_page_id(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::buffer::replacer::{ReplacerPolicy, StorageConfig};
    use crate::storage::disk::disk_manager::DiskManager;

    #[test]
    fn basic_guard_unpins_on_drop() {
        let dir = TempDir::new().unwrap();
        let db_file = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_file.to_str().unwrap()).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(StorageConfig::new(5, ReplacerPolicy::Lru), disk_manager));

        let guard = bpm.new_page_guarded().unwrap();
        let page_id = guard.page_id();
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        drop(guard);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn write_guard_marks_the_page_dirty_on_drop() {
        let dir = TempDir::new().unwrap();
        let db_file = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_file.to_str().unwrap()).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(StorageConfig::new(5, ReplacerPolicy::Lru), disk_manager));

        let page_id = {
            let mut guard = bpm.fetch_page_write(bpm.new_page().unwrap().get_page_id()).unwrap();
            guard.get_data_mut()[0] = 42;
            guard.page_id()
        };
        assert!(bpm.is_dirty(page_id));
    }
}
