//! Compile-time seams for a transaction/locking/logging layer that does not
//! exist yet. This crate never calls into these on its own — a catalog or
//! table heap built on top of `BufferPoolManager`/`BPlusTree` is where a
//! real `LockManager`/`LogManager` would get wired in.

use crate::common::config::{Lsn, PageId, TransactionId};

/// Identifies the caller of a future transactional operation. Opaque today;
/// nothing in this crate inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle(TransactionId);

impl TransactionHandle {
    pub fn new(id: TransactionId) -> Self {
        Self(id)
    }

    pub fn id(&self) -> TransactionId {
        self.0
    }
}

/// Shared vs. exclusive page-level locking, independent of the buffer pool
/// frame latch. A real implementation would block and deadlock-detect; the
/// default granted-unconditionally implementation lets single-threaded or
/// externally-synchronized callers compile against this crate today.
pub trait LockManager: Send + Sync {
    fn lock_shared(&self, txn: TransactionHandle, page_id: PageId) -> bool {
        let _ = (txn, page_id);
        true
    }

    fn lock_exclusive(&self, txn: TransactionHandle, page_id: PageId) -> bool {
        let _ = (txn, page_id);
        true
    }

    fn unlock(&self, txn: TransactionHandle, page_id: PageId) -> bool {
        let _ = (txn, page_id);
        true
    }
}

/// Write-ahead logging hook. A real implementation would assign LSNs and
/// persist log records before the corresponding page flush; the default
/// impl is a no-op so callers have nothing to wait on.
pub trait LogManager: Send + Sync {
    fn append(&self, txn: TransactionHandle, page_id: PageId) -> Lsn {
        let _ = (txn, page_id);
        0
    }
}

/// Grants every lock immediately and never blocks; the default
/// `LockManager` this crate constructs where none is supplied.
#[derive(Debug, Default)]
pub struct NoOpLockManager;

impl LockManager for NoOpLockManager {}

/// Logs nothing; the default `LogManager` this crate constructs where none
/// is supplied.
#[derive(Debug, Default)]
pub struct NoOpLogManager;

impl LogManager for NoOpLogManager {}
