use tracing::{info, warn};

use crate::buffer::BufferPoolManager;
use crate::common::{Result, TransactionId};

/// Handle for one running transaction.
///
/// Ending the transaction consumes the handle, so `transaction_complete`
/// runs exactly once per id. Dropping a handle without committing or
/// aborting leaves its locks in place and is logged.
#[derive(Debug)]
pub struct Transaction {
    tid: TransactionId,
    completed: bool,
}

impl Transaction {
    /// Starts a new transaction with a fresh id.
    pub fn begin() -> Self {
        let tid = TransactionId::new();
        info!(%tid, "transaction started");
        Self {
            tid,
            completed: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    /// Forces every page this transaction dirtied to disk, then releases
    /// its locks. No page guard obtained by this transaction may be alive.
    pub fn commit(mut self, bpm: &BufferPoolManager) -> Result<()> {
        self.completed = true;
        bpm.transaction_complete(self.tid, true)
    }

    /// Discards every change this transaction made in the buffer pool, then
    /// releases its locks.
    pub fn abort(mut self, bpm: &BufferPoolManager) -> Result<()> {
        self.completed = true;
        bpm.transaction_complete(self.tid, false)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.completed {
            warn!(tid = %self.tid, "transaction dropped without commit or abort");
        }
    }
}
