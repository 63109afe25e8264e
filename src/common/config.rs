//! Crate-wide constants and id types.

/// Size in bytes of a single page, on disk and in a buffer frame.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel meaning "no page" — used for `root_page_id`, `parent_page_id`,
/// `next_page_id`, and as the return value of an exhausted allocator.
pub const INVALID_PAGE_ID: PageId = -1;

/// Physical page 0: file-level allocation metadata (`DiskFileMetaPage`).
pub const META_PAGE_ID: PageId = 0;

/// Logical page 1: the index-roots map (`index_id -> root_page_id`).
pub const INDEX_ROOTS_PAGE_ID: PageId = 1;

/// Number of extent slots tracked in the file metadata page. Bounds the
/// number of bitmap pages (and therefore the maximum database size) a
/// single file-metadata page can describe.
pub const MAX_EXTENTS: usize = (PAGE_SIZE - 8) / 4;

/// Number of data pages described by one bitmap page: one bit per page.
pub const BITMAP_PAGE_BITS: usize = PAGE_SIZE * 8;

/// Logical/physical page identifier. Signed so `INVALID_PAGE_ID = -1` is
/// representable without a separate `Option` wrapper at the wire layer.
pub type PageId = i32;

/// Index into the buffer pool's frame array.
pub type FrameId = usize;

/// Opaque handle a future transaction manager would use to track callers.
pub type TransactionId = u32;

/// Log sequence number; threaded through pages for a future log manager.
pub type Lsn = u64;
