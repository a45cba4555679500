use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::common::{FrameId, PageId, Result, SableError, TransactionId, DEFAULT_BUFFER_POOL_SIZE};
use crate::concurrency::{LockManager, LockMode};
use crate::tuple::Tuple;

use super::{FrameHeader, PageGuard, ReadPageGuard, WritePageGuard};

/// Bookkeeping guarded by the pool mutex
struct PoolState {
    /// Page table: maps page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager caches heap file pages in a fixed number of frames and
/// is the only way transactions reach page bytes.
///
/// Every fetch first acquires the page lock for the transaction, so a
/// returned guard is always backed by a shared or exclusive page lock. The
/// pool follows NO-STEAL/FORCE: a frame dirtied by a running transaction
/// is never evicted, and commit writes all of that transaction's pages
/// before its locks are released.
///
/// Page guards hold a latch on the frame. A transaction must drop its guard
/// on a page before fetching the same page again and before it completes.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    frames: Vec<Arc<FrameHeader>>,
    state: Mutex<PoolState>,
    /// Logical clock stamped on frames at every fetch
    clock: AtomicU64,
    catalog: Arc<Catalog>,
    lock_manager: Arc<LockManager>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` empty frames over the tables in `catalog`.
    pub fn new(pool_size: usize, catalog: Arc<Catalog>, lock_manager: Arc<LockManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            clock: AtomicU64::new(1),
            catalog,
            lock_manager,
        }
    }

    /// Creates a pool with the default number of frames.
    pub fn with_default_size(catalog: Arc<Catalog>, lock_manager: Arc<LockManager>) -> Self {
        Self::new(DEFAULT_BUFFER_POOL_SIZE, catalog, lock_manager)
    }

    /// Locks `page_id` for `tid` in `mode`, then returns the page latched in
    /// the same mode. Blocks while another transaction holds a conflicting
    /// lock; fails if waiting would deadlock.
    pub fn fetch_page(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<PageGuard> {
        Ok(match mode {
            LockMode::Shared => PageGuard::Read(self.fetch_page_shared(tid, page_id)?),
            LockMode::Exclusive => PageGuard::Write(self.fetch_page_exclusive(tid, page_id)?),
        })
    }

    /// Fetches a page for reading under a shared lock.
    pub fn fetch_page_shared(&self, tid: TransactionId, page_id: PageId) -> Result<ReadPageGuard> {
        self.lock_manager.acquire_shared(tid, page_id)?;
        let frame = self.pin_page(page_id)?;
        Ok(ReadPageGuard::new(page_id, frame))
    }

    /// Fetches a page for writing under an exclusive lock.
    pub fn fetch_page_exclusive(&self, tid: TransactionId, page_id: PageId) -> Result<WritePageGuard> {
        self.lock_manager.acquire_exclusive(tid, page_id)?;
        let frame = self.pin_page(page_id)?;
        Ok(WritePageGuard::new(tid, page_id, frame))
    }

    /// Inserts a tuple into the given table and sets its record id.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: u32, tuple: &mut Tuple) -> Result<Vec<PageId>> {
        self.catalog.table(table_id)?.insert_tuple(self, tid, tuple)
    }

    /// Deletes a tuple from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<Vec<PageId>> {
        let record_id = tuple.record_id().ok_or(SableError::MissingRecordId)?;
        self.catalog
            .table(record_id.page_id.table_id)?
            .delete_tuple(self, tid, tuple)
    }

    /// Ends a transaction. On commit every page it dirtied is written to
    /// disk; on abort those frames are reloaded from disk. Its locks are
    /// released in both cases, even if a write fails.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let result = self.finish_pages(tid, commit);
        self.lock_manager.release_all(tid);
        info!(%tid, commit, ok = result.is_ok(), "transaction complete");
        result
    }

    fn finish_pages(&self, tid: TransactionId, commit: bool) -> Result<()> {
        // Pinned so discard_page cannot hand the frames to another page
        // once the pool mutex is released.
        let dirtied: Vec<_> = {
            let state = self.state.lock();
            state
                .page_table
                .iter()
                .map(|(&page_id, &frame_id)| (page_id, &self.frames[frame_id.as_usize()]))
                .filter(|(_, frame)| frame.dirtied_by() == Some(tid))
                .inspect(|(_, frame)| {
                    frame.pin();
                })
                .collect()
        };

        let result: Result<()> = dirtied.iter().try_for_each(|&(page_id, frame)| {
            let file = self.catalog.table(page_id.table_id)?;
            if commit {
                file.write_page(page_id, &frame.data.read()[..])?;
            } else {
                frame.copy_from(&file.read_page(page_id)?);
            }
            frame.clear_dirty();
            Ok(())
        });
        for (_, frame) in &dirtied {
            frame.unpin();
        }

        debug!(%tid, commit, pages = dirtied.len(), "finished transaction pages");
        result
    }

    /// Writes a cached page to disk. Returns false if the page is not
    /// cached, or if it holds writes of a running transaction: those reach
    /// disk only when that transaction commits.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let state = self.state.lock();
            match state.page_table.get(&page_id) {
                Some(&frame_id) => {
                    let frame = &self.frames[frame_id.as_usize()];
                    // Keeps the frame bound to `page_id` until the write is done
                    frame.pin();
                    frame
                }
                None => return Ok(false),
            }
        };

        let result = self.write_committed_frame(page_id, frame);
        frame.unpin();
        result
    }

    /// Writes every cached page that holds no uncommitted writes. Returns
    /// the number of pages written.
    pub fn flush_all_pages(&self) -> Result<usize> {
        let page_ids: Vec<_> = self.state.lock().page_table.keys().copied().collect();

        let mut written = 0;
        for page_id in page_ids {
            if self.flush_page(page_id)? {
                written += 1;
            }
        }
        Ok(written)
    }

    fn write_committed_frame(&self, page_id: PageId, frame: &FrameHeader) -> Result<bool> {
        // A write latch means a transaction is modifying the page right now
        let Some(data) = frame.data.try_read() else {
            return Ok(false);
        };
        if frame.is_dirty() {
            return Ok(false);
        }
        let file = self.catalog.table(page_id.table_id)?;
        file.write_page(page_id, &data[..])?;
        Ok(true)
    }

    /// Drops a page from the pool without writing it. Returns false if the
    /// page is not cached or is still pinned.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return false;
        }
        state.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        true
    }

    /// Releases one page lock before the transaction ends. This breaks
    /// two-phase locking and is only safe for pages the transaction did
    /// not use.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    /// Returns the pin count of a cached page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    /// Whether a cached page holds unflushed changes.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].is_dirty())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Pins the frame holding `page_id`, loading it from its heap file on a
    /// miss.
    ///
    /// The load runs under the pool mutex, so two misses on one page never
    /// load it twice. Reading the page just past the end of a file also
    /// writes the new empty page here.
    fn pin_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            frame.touch(self.tick());
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.take_frame(&mut state)?;
        let data = match self
            .catalog
            .table(page_id.table_id)
            .and_then(|file| file.read_page(page_id))
        {
            Ok(data) => data,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.as_usize()];
        frame.copy_from(&data);
        frame.set_page_id(Some(page_id));
        frame.pin();
        frame.touch(self.tick());
        state.page_table.insert(page_id, frame_id);

        debug!(%page_id, %frame_id, "loaded page into buffer pool");
        Ok(Arc::clone(frame))
    }

    /// Gets a free frame, either from the free list or by evicting the least
    /// recently used frame that is unpinned and clean.
    fn take_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let victim = self
            .frames
            .iter()
            .filter(|frame| frame.pin_count() == 0 && !frame.is_dirty())
            .min_by_key(|frame| frame.last_access())
            .ok_or(SableError::BufferPoolFull)?;

        if let Some(old_page_id) = victim.page_id() {
            state.page_table.remove(&old_page_id);
            debug!(page_id = %old_page_id, frame_id = %victim.frame_id(), "evicted page");
        }
        victim.reset();
        Ok(victim.frame_id())
    }
}
