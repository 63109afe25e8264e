use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::buffer::replacer::{make_replacer, Replacer, ReplacerPolicy, StorageConfig};
use crate::common::config::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::common::error::{DbError, DbResult};
use crate::storage::disk::{DiskManager, DiskRequest, DiskScheduler};
use crate::storage::page::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use crate::storage::page::Page;

/// Reads disk pages to and from its internal buffer pool, handing out pins
/// on the in-memory `Page`s that back them.
///
/// Victim selection is free-list-first-then-replacer. A dirty victim is
/// flushed synchronously before its frame is reused — the only disk I/O
/// this manager ever does with the pool mutex held, and always *before* any
/// latch on the new page's content is taken — latches are never held
/// across disk I/O.
pub struct BufferPoolManager {
    pool_size: usize,
    pages: Vec<Page>,
    disk_scheduler: DiskScheduler,
    // log_manager: Option<Arc<dyn crate::concurrency::LogManager>>,
    page_table: Mutex<HashMap<PageId, FrameId>>,
    replacer: Box<dyn Replacer>,
    free_list: Mutex<Vec<FrameId>>,
}

impl BufferPoolManager {
    pub fn new(config: StorageConfig, disk_manager: DiskManager) -> Self {
        let StorageConfig {
            pool_size,
            replacer_policy,
        } = config;
        tracing::info!(pool_size, ?replacer_policy, "starting buffer pool manager");
        let free_list = (0..pool_size).rev().collect();
        Self {
            pool_size,
            pages: (0..pool_size).map(|_| Page::new()).collect(),
            disk_scheduler: DiskScheduler::new(disk_manager),
            page_table: Mutex::new(HashMap::new()),
            replacer: make_replacer(replacer_policy),
            free_list: Mutex::new(free_list),
        }
    }

    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn get_pages(&self) -> &[Page] {
        &self.pages
    }

    /// Creates a brand-new page, pinned once. An error if every frame is
    /// currently pinned, or if the disk allocator has no free page left.
    pub fn new_page(&self) -> DbResult<Page> {
        let frame_id = self.evict_frame_for_reuse()?;

        let page_id = match self.allocate_page() {
            Ok(id) => id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        self.page_table.lock().insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(page.clone())
    }

    pub fn new_page_guarded(self: &Arc<Self>) -> DbResult<BasicPageGuard> {
        let page = self.new_page()?;
        Ok(BasicPageGuard::new(self.clone(), page))
    }

    /// Finds `page_id` in the pool, fetching it from disk first if needed.
    pub fn fetch_page(&self, page_id: PageId) -> DbResult<Page> {
        if let Some(&frame_id) = self.page_table.lock().get(&page_id) {
            let page = &self.pages[frame_id];
            page.pin();
            self.replacer.pin(frame_id);
            return Ok(page.clone());
        }

        let frame_id = self.evict_frame_for_reuse()?;

        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();

        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Read {
            page: page.clone(),
            callback: tx,
        });
        rx.blocking_recv().expect("disk scheduler worker gone")?;

        self.page_table.lock().insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(page.clone())
    }

    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> DbResult<BasicPageGuard> {
        let page = self.fetch_page(page_id)?;
        Ok(BasicPageGuard::new(self.clone(), page))
    }

    /// Fetches `page_id` and returns a guard already holding its read
    /// latch: the latch is taken only after any fetch-time disk I/O above
    /// has completed.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> DbResult<ReadPageGuard> {
        let page = self.fetch_page(page_id)?;
        Ok(ReadPageGuard::new(self.clone(), page))
    }

    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> DbResult<WritePageGuard> {
        let page = self.fetch_page(page_id)?;
        Ok(WritePageGuard::new(self.clone(), page))
    }

    /// Decrements `page_id`'s pin count and ORs `is_dirty` into its dirty
    /// flag. `false` if the page is not resident or is already unpinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let Some(&frame_id) = self.page_table.lock().get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() <= 0 {
            return false;
        }
        page.set_dirty(is_dirty);
        page.unpin();
        if page.get_pin_count() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Flushes `page_id` to disk regardless of its dirty flag, clearing the
    /// flag afterward. `false` if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> DbResult<bool> {
        let Some(&frame_id) = self.page_table.lock().get(&page_id) else {
            return Ok(false);
        };
        let page = &self.pages[frame_id];
        self.flush_frame(page)?;
        Ok(true)
    }

    pub fn flush_all_pages(&self) -> DbResult<()> {
        let frame_ids: Vec<FrameId> = self.page_table.lock().values().copied().collect();
        for frame_id in frame_ids {
            self.flush_frame(&self.pages[frame_id])?;
        }
        Ok(())
    }

    fn flush_frame(&self, page: &Page) -> DbResult<()> {
        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Write {
            page: page.clone(),
            callback: tx,
        });
        rx.blocking_recv().expect("disk scheduler worker gone")?;
        page.clear_dirty();
        Ok(())
    }

    /// Removes `page_id` from the pool and frees its disk space. `true` if
    /// the page wasn't resident, or deletion succeeded; `false` if it's
    /// still pinned.
    pub fn delete_page(&self, page_id: PageId) -> DbResult<bool> {
        let frame_id = {
            let mut table = self.page_table.lock();
            let Some(&frame_id) = table.get(&page_id) else {
                return Ok(true);
            };
            if self.pages[frame_id].get_pin_count() > 0 {
                return Ok(false);
            }
            table.remove(&page_id);
            frame_id
        };

        tracing::debug!(page_id, frame_id, "deleting page");
        self.replacer.pin(frame_id);
        self.free_list.lock().push(frame_id);
        self.pages[frame_id].reset();
        self.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Asserts no resident page is still pinned; used by tests and callers
    /// that want to confirm clean shutdown.
    pub fn check_all_unpinned(&self) -> bool {
        self.page_table
            .lock()
            .values()
            .all(|&frame_id| self.pages[frame_id].get_pin_count() == 0)
    }

    pub fn get_pin_count(&self, page_id: PageId) -> Option<i32> {
        let frame_id = *self.page_table.lock().get(&page_id)?;
        Some(self.pages[frame_id].get_pin_count())
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        match self.page_table.lock().get(&page_id) {
            Some(&frame_id) => self.pages[frame_id].is_dirty(),
            None => false,
        }
    }

    /// Picks a frame from the free list first, then the replacer, flushing
    /// a dirty victim before handing the frame back for reuse.
    fn evict_frame_for_reuse(&self) -> DbResult<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        let Some(frame_id) = self.replacer.victim() else {
            tracing::warn!(pool_size = self.pool_size, "buffer pool exhausted, no evictable frame");
            return Err(DbError::BufferPoolExhausted);
        };
        let victim = &self.pages[frame_id];
        let old_page_id = victim.get_page_id();
        if victim.is_dirty() {
            tracing::debug!(page_id = old_page_id, frame_id, "flushing dirty victim before reuse");
            self.flush_frame(victim)?;
        }
        if old_page_id != INVALID_PAGE_ID {
            self.page_table.lock().remove(&old_page_id);
        }
        Ok(frame_id)
    }

    /// Claims `page_id` directly in the disk allocator, so `new_page` never
    /// hands it out. The index layer uses this to reserve its well-known
    /// index-roots page address; a no-op on a database that already has it.
    pub fn reserve_page(&self, page_id: PageId) -> DbResult<()> {
        self.disk_scheduler.disk_manager().reserve_page(page_id)
    }

    fn allocate_page(&self) -> DbResult<PageId> {
        let id = self.disk_scheduler.disk_manager().allocate_page()?;
        if id == INVALID_PAGE_ID {
            return Err(DbError::DiskSpaceExhausted);
        }
        Ok(id)
    }

    fn deallocate_page(&self, page_id: PageId) -> DbResult<()> {
        self.disk_scheduler.disk_manager().deallocate_page(page_id)
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use tempfile::TempDir;

    use super::*;
    use crate::storage::disk::DiskManager;

    fn temp_bpm(pool_size: usize, policy: ReplacerPolicy) -> (TempDir, BufferPoolManager) {
        crate::test_support::init_tracing();
        let dir = TempDir::new().unwrap();
        let db_name = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_name.to_str().unwrap()).unwrap();
        (
            dir,
            BufferPoolManager::new(StorageConfig::new(pool_size, policy), disk_manager),
        )
    }

    #[test]
    fn binary_data_round_trips_through_eviction() {
        let (_dir, bpm) = temp_bpm(10, ReplacerPolicy::Lru);

        let page0 = bpm.new_page().unwrap();

        let mut rng = rand::thread_rng();
        let uniform = Uniform::from(u8::MIN..=u8::MAX);
        let mut random_binary_data: Vec<u8> =
            (0..PAGE_SIZE).map(|_| uniform.sample(&mut rng)).collect();
        random_binary_data[PAGE_SIZE / 2] = 0;
        random_binary_data[PAGE_SIZE - 1] = 0;

        page0.get_mut_data()[..random_binary_data.len()].copy_from_slice(&random_binary_data);
        assert_eq!(
            &random_binary_data[..],
            &page0.get_data()[..random_binary_data.len()]
        );

        for _ in 1..10 {
            assert!(bpm.new_page().is_ok());
        }
        for _ in 10..20 {
            assert!(bpm.new_page().is_err());
        }

        for i in 0..5 {
            assert!(bpm.unpin_page(i, true));
            bpm.flush_page(i).unwrap();
        }
        for _ in 0..5 {
            let page = bpm.new_page().unwrap();
            bpm.unpin_page(page.get_page_id(), false);
        }

        let page0 = bpm.fetch_page(0).unwrap();
        assert_eq!(&page0.get_data()[..], random_binary_data.as_slice());
        bpm.unpin_page(0, true);
    }

    #[test]
    fn exhausted_pool_recovers_once_a_page_is_unpinned() {
        let (_dir, bpm) = temp_bpm(3, ReplacerPolicy::Lru);

        let pages: Vec<_> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
        assert!(bpm.new_page().is_err());

        bpm.unpin_page(pages[0].get_page_id(), false);
        assert!(bpm.new_page().is_ok());
    }

    #[test]
    fn delete_page_frees_disk_space_for_reuse() {
        let (_dir, bpm) = temp_bpm(5, ReplacerPolicy::Lru);

        let page = bpm.new_page().unwrap();
        let page_id = page.get_page_id();
        bpm.unpin_page(page_id, false);
        assert!(bpm.delete_page(page_id).unwrap());

        let next = bpm.new_page().unwrap();
        assert_eq!(next.get_page_id(), page_id);
    }

    #[test]
    fn clock_policy_evicts_the_unpinned_frame() {
        let (_dir, bpm) = temp_bpm(2, ReplacerPolicy::Clock);

        let a = bpm.new_page().unwrap();
        let b = bpm.new_page().unwrap();
        bpm.unpin_page(a.get_page_id(), false);
        bpm.unpin_page(b.get_page_id(), false);

        let c = bpm.new_page().unwrap();
        assert!(bpm.get_pin_count(c.get_page_id()).unwrap() > 0);
    }
}
