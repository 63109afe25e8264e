use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use tokio::sync::oneshot;

use crate::common::error::DbResult;
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// A read or write the background worker thread executes against the disk
/// manager on the caller's behalf.
pub enum DiskRequest {
    Read {
        page: Page,
        callback: oneshot::Sender<DbResult<()>>,
    },
    Write {
        page: Page,
        callback: oneshot::Sender<DbResult<()>>,
    },
}

/// Schedules disk read/write operations onto a single background worker
/// thread, so pages get requested from many callers but applied to the file
/// in a well-defined serial order.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_queue: channel::Sender<Option<DiskRequest>>,
    background_thread: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: DiskManager) -> Self {
        tracing::debug!("starting disk scheduler worker thread");
        let disk_manager = Arc::new(disk_manager);
        let (tx, rx) = channel::unbounded();
        let worker_disk_manager = disk_manager.clone();
        Self {
            disk_manager,
            request_queue: tx,
            background_thread: Some(thread::spawn(move || {
                Self::start_worker_thread(rx, worker_disk_manager)
            })),
        }
    }

    /// Direct access to the disk manager for operations the scheduler's
    /// queue doesn't mediate (allocation/deallocation metadata, which are
    /// not page-content I/O).
    pub fn disk_manager(&self) -> &DiskManager {
        &self.disk_manager
    }

    /// Enqueues `r` for the background thread. The caller awaits completion
    /// through the request's own callback channel.
    pub fn schedule(&self, r: DiskRequest) {
        self.request_queue.send(Some(r)).expect("worker thread gone");
    }

    fn start_worker_thread(rx: channel::Receiver<Option<DiskRequest>>, disk_manager: Arc<DiskManager>) {
        while let Ok(r) = rx.recv() {
            match r {
                Some(DiskRequest::Read { page, callback }) => {
                    let page_id = page.get_page_id();
                    let result = disk_manager.read_page(page_id, &mut page.get_mut_data());
                    if let Err(ref e) = result {
                        tracing::error!(page_id, error = %e, "disk read failed");
                    }
                    let _ = callback.send(result);
                }
                Some(DiskRequest::Write { page, callback }) => {
                    let page_id = page.get_page_id();
                    let result = disk_manager.write_page(page_id, &page.get_data());
                    if let Err(ref e) = result {
                        tracing::error!(page_id, error = %e, "disk write failed");
                    }
                    let _ = callback.send(result);
                }
                None => break,
            }
        }
        tracing::debug!("disk scheduler worker thread stopped");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.request_queue.send(None);
        if let Some(handle) = self.background_thread.take() {
            let _ = handle.join();
        }
    }
}
