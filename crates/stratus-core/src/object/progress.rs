use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::Sender;

use super::options::TransferProgress;

/// Running byte count for one transfer, published to an optional channel.
pub(crate) struct Progress {
    tx: Option<Sender<TransferProgress>>,
    done: AtomicU64,
    total: u64,
}

impl Progress {
    pub(crate) fn new(tx: Option<Sender<TransferProgress>>, total: u64) -> Self {
        Self {
            tx,
            done: AtomicU64::new(0),
            total,
        }
    }

    /// Add `bytes` and publish. A full or closed channel drops the update.
    pub(crate) fn advance(&self, bytes: u64) {
        let done = self.done.fetch_add(bytes, Ordering::AcqRel) + bytes;
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(TransferProgress {
                bytes_done: done,
                total_bytes: self.total,
            });
        }
    }
}
