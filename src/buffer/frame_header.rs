use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::common::{FrameId, PageId, TransactionId, PAGE_SIZE};

pub(crate) type FrameData = Arc<RwLock<Box<[u8; PAGE_SIZE]>>>;

/// FrameHeader manages a single buffer frame in the buffer pool.
/// It stores metadata about the frame and the actual page data.
pub struct FrameHeader {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// The page held by this frame, if any
    page_id: Mutex<Option<PageId>>,
    /// Number of live page guards on this frame
    pin_count: AtomicU32,
    /// Logical timestamp of the last fetch, used to pick eviction victims
    last_access: AtomicU64,
    /// Transaction whose uncommitted writes this frame holds
    dirtied_by: Mutex<Option<TransactionId>>,
    /// The page bytes. Guards hold this latch for their whole lifetime.
    pub(crate) data: FrameData,
}

impl FrameHeader {
    /// Creates an empty, unpinned frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            last_access: AtomicU64::new(0),
            dirtied_by: Mutex::new(None),
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    /// Returns the frame ID.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page currently held by this frame.
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    /// Sets the page held by this frame.
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    /// Returns the current pin count.
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    /// Returns the logical time of the last fetch.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    /// Records a fetch at logical time `tick`.
    pub fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Release);
    }

    /// Returns true if the frame holds writes not yet on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.lock().is_some()
    }

    /// The transaction that last modified this frame, if not yet flushed.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtied_by.lock()
    }

    /// Marks the frame as modified by `tid`.
    pub fn mark_dirty(&self, tid: TransactionId) {
        *self.dirtied_by.lock() = Some(tid);
    }

    /// Clears the dirty flag once the frame matches disk again.
    pub fn clear_dirty(&self) {
        *self.dirtied_by.lock() = None;
    }

    /// Copies data from the given slice into the frame.
    pub fn copy_from(&self, data: &[u8]) {
        self.data.write().copy_from_slice(data);
    }

    /// Copies data from the frame into the given slice.
    pub fn copy_to(&self, data: &mut [u8]) {
        data.copy_from_slice(&**self.data.read());
    }

    /// Resets the frame to its initial state.
    pub fn reset(&self) {
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Release);
        self.last_access.store(0, Ordering::Release);
        self.clear_dirty();
        self.data.write().fill(0);
    }
}
