use std::ops::Deref;
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::{PageId, TransactionId, PAGE_SIZE};

use super::FrameHeader;

type DataReadGuard = ArcRwLockReadGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;
type DataWriteGuard = ArcRwLockWriteGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;

/// One pin on a frame, given back on drop.
struct FramePin {
    page_id: PageId,
    frame: Arc<FrameHeader>,
}

impl Drop for FramePin {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

/// RAII guard for read-only access to a page.
/// Automatically unpins the page when dropped.
pub struct ReadPageGuard {
    // Declared before `pin` so the latch is released before the unpin.
    data: DataReadGuard,
    pin: FramePin,
}

impl ReadPageGuard {
    /// Latches a frame the caller has already pinned.
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>) -> Self {
        let data = frame.data.read_arc();
        Self {
            data,
            pin: FramePin { page_id, frame },
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// RAII guard for read-write access to a page on behalf of one transaction.
/// Any mutable access marks the frame dirty for that transaction.
pub struct WritePageGuard {
    tid: TransactionId,
    data: DataWriteGuard,
    pin: FramePin,
}

impl WritePageGuard {
    /// Latches a frame the caller has already pinned.
    pub(crate) fn new(tid: TransactionId, page_id: PageId, frame: Arc<FrameHeader>) -> Self {
        let data = frame.data.write_arc();
        Self {
            tid,
            data,
            pin: FramePin { page_id, frame },
        }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// Returns the transaction that fetched this page.
    pub fn transaction_id(&self) -> TransactionId {
        self.tid
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Returns the page bytes for modification and marks the frame dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pin.frame.mark_dirty(self.tid);
        &mut self.data[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// A page handed out by `BufferPoolManager::fetch_page`, latched in the
/// mode its lock was acquired in.
pub enum PageGuard {
    Read(ReadPageGuard),
    Write(WritePageGuard),
}

impl PageGuard {
    pub fn page_id(&self) -> PageId {
        match self {
            PageGuard::Read(guard) => guard.page_id(),
            PageGuard::Write(guard) => guard.page_id(),
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            PageGuard::Read(guard) => guard.data(),
            PageGuard::Write(guard) => guard.data(),
        }
    }

    /// The write guard, if this page was fetched exclusively.
    pub fn as_write(&mut self) -> Option<&mut WritePageGuard> {
        match self {
            PageGuard::Write(guard) => Some(guard),
            PageGuard::Read(_) => None,
        }
    }
}


impl std::fmt::Debug for ReadPageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.pin.page_id)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for WritePageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("tid", &self.tid)
            .field("page_id", &self.pin.page_id)
            .finish_non_exhaustive()
    }
}
