//! Owns the one database file, carves it into fixed-size physical pages,
//! and allocates/frees logical data pages through a chain of bitmap pages.
//!
//! Opens the file if it exists, creates it otherwise; a read past
//! end-of-file zero-fills rather than failing, since a never-written page
//! is a normal state for a brand-new file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::common::config::{PageId, BITMAP_PAGE_BITS, INVALID_PAGE_ID, MAX_EXTENTS, PAGE_SIZE};
use crate::common::error::{DbError, DbResult};
use crate::storage::disk::bitmap_page::BitmapPage;
use crate::storage::disk::meta_page::MetaPage;

/// Data pages per extent: one bit per page in a bitmap page.
const N: usize = BITMAP_PAGE_BITS;

/// Takes care of allocation/deallocation of pages within a database file,
/// and performs the reading and writing of pages to and from disk.
pub struct DiskManager {
    db_io: Mutex<File>,
    file_name: String,
    num_writes: Mutex<u64>,
}

impl DiskManager {
    /// Opens `db_file`, creating it if it does not already exist.
    pub fn new(db_file: &str) -> DbResult<Self> {
        let path = Path::new(db_file);
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            })?;

        let manager = Self {
            db_io: Mutex::new(db_io),
            file_name: db_file.to_string(),
            num_writes: Mutex::new(0),
        };

        // A brand-new file needs a zeroed meta page so the very first
        // `allocate_page` doesn't read back garbage counters.
        if manager.file_len()? == 0 {
            let zero = [0u8; PAGE_SIZE];
            manager.write_physical_page(0, &zero)?;
        }

        Ok(manager)
    }

    fn file_len(&self) -> DbResult<u64> {
        Ok(self.db_io.lock().metadata()?.len())
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn num_writes(&self) -> u64 {
        *self.num_writes.lock()
    }

    /// Read `PAGE_SIZE` bytes for logical page `page_id` into `out`. Reads
    /// past end-of-file are zero-filled, representing a page never written.
    pub fn read_page(&self, page_id: PageId, out: &mut [u8; PAGE_SIZE]) -> DbResult<()> {
        if page_id < 0 {
            return Err(DbError::PageNotFound(page_id));
        }
        self.read_physical_page(self.map_page_id(page_id), out)
    }

    /// Write `PAGE_SIZE` bytes for logical page `page_id`, flushing before
    /// returning: the call does not report success until the bytes are
    /// durable.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> DbResult<()> {
        if page_id < 0 {
            return Err(DbError::PageNotFound(page_id));
        }
        self.write_physical_page(self.map_page_id(page_id), data)
    }

    fn read_physical_page(&self, physical_id: i64, out: &mut [u8; PAGE_SIZE]) -> DbResult<()> {
        let offset = physical_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_io.lock();
        let len = file.metadata()?.len();
        if offset >= len {
            debug!("read past end of file at physical page {physical_id}, zero-filling");
            out.fill(0);
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        let read = file.read(out)?;
        if read < PAGE_SIZE {
            debug!("short read at physical page {physical_id}: {read} of {PAGE_SIZE} bytes");
            out[read..].fill(0);
        }
        Ok(())
    }

    fn write_physical_page(&self, physical_id: i64, data: &[u8; PAGE_SIZE]) -> DbResult<()> {
        let offset = physical_id as u64 * PAGE_SIZE as u64;
        let mut file = self.db_io.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        drop(file);
        *self.num_writes.lock() += 1;
        Ok(())
    }

    /// `physical(logical) = (logical / N) * (N+1) + (logical % N) + 1 + 1`
    /// — skips physical page 0 (meta) and the bitmap page at the head of
    /// each extent.
    fn map_page_id(&self, logical_id: PageId) -> i64 {
        let logical_id = logical_id as i64;
        let n = N as i64;
        (logical_id / n) * (n + 1) + (logical_id % n) + 1 + 1
    }

    /// First physical page of the bitmap governing `logical_id`'s extent.
    fn bitmap_physical_page(&self, logical_id: PageId) -> i64 {
        let n = N as i64;
        (logical_id as i64 / n) * (n + 1) + 1
    }

    /// Scans bitmap pages in order and claims the first free data page.
    /// Returns `INVALID_PAGE_ID` if the address space is exhausted.
    pub fn allocate_page(&self) -> DbResult<PageId> {
        let mut bitmap_buf = [0u8; PAGE_SIZE];
        // Bounded by MAX_EXTENTS: the file-metadata page's extent_used_page
        // table has exactly that many slots, so a bitmap beyond it would
        // have nowhere to record its per-extent used-page count.
        for extent in 0..MAX_EXTENTS as i64 {
            let bitmap_physical = extent * (N as i64 + 1) + 1;
            self.read_physical_page(bitmap_physical, &mut bitmap_buf)?;
            let was_empty = BitmapPage::new(&mut bitmap_buf).page_allocated() == 0;
            let offset = BitmapPage::new(&mut bitmap_buf).allocate_page();
            let Some(offset) = offset else {
                continue;
            };
            self.write_physical_page(bitmap_physical, &bitmap_buf)?;

            let mut meta_buf = [0u8; PAGE_SIZE];
            self.read_physical_page(0, &mut meta_buf)?;
            {
                let mut meta = MetaPage::new(&mut meta_buf);
                meta.set_num_allocated_pages(meta.num_allocated_pages() + 1);
                meta.set_extent_used_pages(
                    extent as usize,
                    meta.extent_used_pages(extent as usize) + 1,
                );
                if was_empty {
                    meta.set_num_extents(meta.num_extents() + 1);
                }
            }
            self.write_physical_page(0, &meta_buf)?;

            return Ok(extent as PageId * N as PageId + offset as PageId);
        }
        Ok(INVALID_PAGE_ID)
    }

    /// Clears the bit for `logical_id` and zero-wipes its page contents.
    /// A no-op (not an error) if the page is already free.
    pub fn deallocate_page(&self, logical_id: PageId) -> DbResult<()> {
        if logical_id < 0 || self.is_page_free(logical_id)? {
            return Ok(());
        }

        let zero = [0u8; PAGE_SIZE];
        self.write_page(logical_id, &zero)?;

        let bitmap_physical = self.bitmap_physical_page(logical_id);
        let mut bitmap_buf = [0u8; PAGE_SIZE];
        self.read_physical_page(bitmap_physical, &mut bitmap_buf)?;
        let offset_in_extent = (logical_id as i64 % N as i64) as u32;
        let became_empty;
        {
            let mut bitmap = BitmapPage::new(&mut bitmap_buf);
            bitmap.deallocate_page(offset_in_extent);
            became_empty = bitmap.page_allocated() == 0;
        }
        self.write_physical_page(bitmap_physical, &bitmap_buf)?;

        let extent = logical_id as i64 / N as i64;
        let mut meta_buf = [0u8; PAGE_SIZE];
        self.read_physical_page(0, &mut meta_buf)?;
        {
            let mut meta = MetaPage::new(&mut meta_buf);
            meta.set_num_allocated_pages(meta.num_allocated_pages().saturating_sub(1));
            meta.set_extent_used_pages(
                extent as usize,
                meta.extent_used_pages(extent as usize).saturating_sub(1),
            );
            if became_empty {
                meta.set_num_extents(meta.num_extents().saturating_sub(1));
            }
        }
        self.write_physical_page(0, &meta_buf)?;
        Ok(())
    }

    /// Claims `logical_id` directly in its bitmap page, bypassing
    /// `allocate_page`'s first-free-slot scan. The index layer uses this
    /// once to reserve `INDEX_ROOTS_PAGE_ID` so the generic allocator never
    /// hands that address to an ordinary node page. No-op if already
    /// allocated (idempotent across repeated opens of the same file).
    pub fn reserve_page(&self, logical_id: PageId) -> DbResult<()> {
        if logical_id < 0 || !self.is_page_free(logical_id)? {
            return Ok(());
        }

        let bitmap_physical = self.bitmap_physical_page(logical_id);
        let mut bitmap_buf = [0u8; PAGE_SIZE];
        self.read_physical_page(bitmap_physical, &mut bitmap_buf)?;
        let offset_in_extent = (logical_id as i64 % N as i64) as u32;
        let was_empty;
        {
            let mut bitmap = BitmapPage::new(&mut bitmap_buf);
            was_empty = bitmap.page_allocated() == 0;
            bitmap.force_allocate(offset_in_extent);
        }
        self.write_physical_page(bitmap_physical, &bitmap_buf)?;

        let extent = logical_id as i64 / N as i64;
        let mut meta_buf = [0u8; PAGE_SIZE];
        self.read_physical_page(0, &mut meta_buf)?;
        {
            let mut meta = MetaPage::new(&mut meta_buf);
            meta.set_num_allocated_pages(meta.num_allocated_pages() + 1);
            meta.set_extent_used_pages(extent as usize, meta.extent_used_pages(extent as usize) + 1);
            if was_empty {
                meta.set_num_extents(meta.num_extents() + 1);
            }
        }
        self.write_physical_page(0, &meta_buf)?;
        Ok(())
    }

    /// Constant-time bitmap lookup: is `logical_id` unallocated?
    pub fn is_page_free(&self, logical_id: PageId) -> DbResult<bool> {
        if logical_id < 0 {
            return Ok(true);
        }
        let bitmap_physical = self.bitmap_physical_page(logical_id);
        let mut bitmap_buf = [0u8; PAGE_SIZE];
        self.read_physical_page(bitmap_physical, &mut bitmap_buf)?;
        let offset_in_extent = (logical_id as i64 % N as i64) as u32;
        Ok(BitmapPage::new(&mut bitmap_buf).is_page_free(offset_in_extent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_manager() -> (TempDir, DiskManager) {
        crate::test_support::init_tracing();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::new(path.to_str().unwrap()).unwrap();
        (dir, dm)
    }

    #[test]
    fn read_tolerates_never_written_page() {
        let (_dir, dm) = temp_manager();
        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, [0u8; PAGE_SIZE]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, dm) = temp_manager();
        let mut data = [0u8; PAGE_SIZE];
        data[..14].copy_from_slice(b"A test string.");
        dm.write_page(0, &data).unwrap();
        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn allocator_hands_out_dense_contiguous_logical_ids() {
        let (_dir, dm) = temp_manager();
        for expected in 0..100 {
            let id = dm.allocate_page().unwrap();
            assert_eq!(id, expected);
        }
        let mut meta_buf = [0u8; PAGE_SIZE];
        dm.read_physical_page(0, &mut meta_buf).unwrap();
        let meta = MetaPage::new(&mut meta_buf);
        assert_eq!(meta.num_allocated_pages(), 100);
        assert_eq!(meta.num_extents(), 1);
    }

    #[test]
    fn deallocate_is_idempotent() {
        let (_dir, dm) = temp_manager();
        let id = dm.allocate_page().unwrap();
        dm.deallocate_page(id).unwrap();
        assert!(dm.is_page_free(id).unwrap());
        dm.deallocate_page(id).unwrap();
        assert!(dm.is_page_free(id).unwrap());
    }

    #[test]
    fn deallocate_then_reallocate_reuses_the_freed_slot() {
        let (_dir, dm) = temp_manager();
        let ids: Vec<_> = (0..5).map(|_| dm.allocate_page().unwrap()).collect();
        dm.deallocate_page(ids[2]).unwrap();
        let reused = dm.allocate_page().unwrap();
        assert_eq!(reused, ids[2]);
    }
}
