//! Crate-wide error taxonomy.
//!
//! Five kinds: space exhaustion and not-found are ordinary control flow
//! (callers branch on them, never retried inside the core); precondition
//! violations are caller bugs reported as failures with no state change;
//! corruption and I/O errors propagate to the caller.

use crate::common::config::PageId;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("no frame available in buffer pool (pool full of pinned pages)")]
    BufferPoolExhausted,

    #[error("disk manager has no free page left to allocate")]
    DiskSpaceExhausted,

    #[error("page {0} not found")]
    PageNotFound(PageId),

    #[error("key not found")]
    KeyNotFound,

    #[error("page {0} is pinned and cannot be deleted")]
    PagePinned(PageId),

    #[error("page {0} is not in the buffer pool")]
    PageNotResident(PageId),

    #[error("data corruption: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
