//! Page-granularity shared/exclusive locking with deadlock detection.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::{LockManagerConfig, PageId, Result, SableError, TransactionId};

use super::page_lock::{LockMode, LockState, PageLock};
use super::wait_for_graph::WaitForGraph;

/// Everything the manager guards with its single mutex.
#[derive(Debug, Default)]
struct LockTable {
    /// One entry per page some transaction holds or waits for
    locks: HashMap<PageId, PageLock>,
    graph: WaitForGraph,
}

impl LockTable {
    fn forget_if_idle(&mut self, page_id: PageId) {
        if self.locks.get(&page_id).is_some_and(PageLock::is_idle) {
            self.locks.remove(&page_id);
        }
    }
}

/// LockManager grants shared and exclusive page locks to transactions.
///
/// A request that cannot be granted registers the requester as a waiter,
/// adding wait-for edges to the page's current holders. If that closes a
/// cycle through the requester, the request fails immediately with
/// `SableError::Deadlock` and leaves no trace; otherwise the caller blocks
/// on the page's condition variable until a release wakes it (or the
/// configured wait interval elapses) and tries again.
///
/// Locks are held until `release` or `release_all`; the manager does not
/// enforce two-phase discipline itself.
pub struct LockManager {
    table: Mutex<LockTable>,
    config: LockManagerConfig,
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_config(LockManagerConfig::default())
    }

    pub fn with_config(config: LockManagerConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            config,
        }
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Blocks until `tid` holds `page_id` in at least shared mode.
    pub fn acquire_shared(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.acquire(tid, page_id, LockMode::Shared)
    }

    /// Blocks until `tid` holds `page_id` exclusively.
    pub fn acquire_exclusive(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.acquire(tid, page_id, LockMode::Exclusive)
    }

    /// Blocks until the lock is granted. Fails without blocking if waiting
    /// would deadlock, and fails with `LockWaitTimeout` once the configured
    /// wait timeout has passed.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let started = Instant::now();
        let mut waited = false;
        let mut table = self.table.lock();

        loop {
            let LockTable { locks, graph } = &mut *table;
            let lock = locks.entry(page_id).or_insert_with(PageLock::new);

            let granted = match mode {
                LockMode::Shared => lock.try_acquire_shared(tid, graph),
                LockMode::Exclusive => lock.try_acquire_exclusive(tid, graph),
            };
            if granted {
                if waited {
                    lock.unregister_waiter(tid, graph);
                    debug!(%tid, %page_id, ?mode, waited_ms = started.elapsed().as_millis() as u64, "lock granted after wait");
                }
                return Ok(());
            }

            lock.register_waiter(tid, graph);
            if graph.in_cycle(tid) {
                lock.unregister_waiter(tid, graph);
                table.forget_if_idle(page_id);
                warn!(%tid, %page_id, ?mode, "deadlock detected, aborting request");
                return Err(SableError::Deadlock { tid, page_id });
            }

            let mut wait = self.config.wait_interval;
            if let Some(limit) = self.config.wait_timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    lock.unregister_waiter(tid, graph);
                    table.forget_if_idle(page_id);
                    warn!(%tid, %page_id, ?mode, "timed out waiting for lock");
                    return Err(SableError::LockWaitTimeout { tid, page_id });
                }
                wait = wait.min(limit - elapsed);
            }

            if !waited {
                debug!(%tid, %page_id, ?mode, holders = ?graph.blockers(tid), "waiting for lock");
                waited = true;
            }
            let released = lock.condvar();
            released.wait_for(&mut table, wait);
        }
    }

    /// Releases `tid`'s lock on one page. No-op if it holds none.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        let mut table = self.table.lock();
        let LockTable { locks, graph } = &mut *table;
        if let Some(lock) = locks.get_mut(&page_id) {
            lock.release(tid, graph);
        }
        table.forget_if_idle(page_id);
    }

    /// Releases every lock `tid` holds. Called once when the transaction ends.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        let LockTable { locks, graph } = &mut *table;

        let mut released = 0usize;
        for lock in locks.values_mut() {
            if lock.release(tid, graph) {
                released += 1;
            }
        }
        locks.retain(|_, lock| !lock.is_idle());
        debug!(%tid, released, "released all locks");
    }

    /// Whether `tid` currently holds `page_id` in any mode.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .is_some_and(|lock| lock.holds(tid))
    }

    pub fn lock_state(&self, page_id: PageId) -> LockState {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .map_or(LockState::Unlocked, PageLock::state)
    }

    /// Current holders of `page_id`, sorted.
    pub fn holders(&self, page_id: PageId) -> Vec<TransactionId> {
        let table = self.table.lock();
        let mut holders: Vec<_> = table
            .locks
            .get(&page_id)
            .map(|lock| lock.holders().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Pages `tid` holds in any mode, sorted.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<_> = table
            .locks
            .iter()
            .filter(|(_, lock)| lock.holds(tid))
            .map(|(&page_id, _)| page_id)
            .collect();
        pages.sort();
        pages
    }

    /// Whether `tid` is currently blocked on some page.
    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.table
            .lock()
            .locks
            .values()
            .any(|lock| lock.is_waiting(tid))
    }

    /// Number of pages with any holder or waiter.
    pub fn tracked_pages(&self) -> usize {
        self.table.lock().locks.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn test_shared_then_exclusive_conflict_state() {
        let lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t2, pid(0)).unwrap();
        assert_eq!(lm.lock_state(pid(0)), LockState::Shared);
        assert_eq!(lm.holders(pid(0)), vec![t1, t2]);

        lm.release(t1, pid(0));
        lm.acquire_exclusive(t2, pid(0)).unwrap();
        assert_eq!(lm.lock_state(pid(0)), LockState::Exclusive);
    }

    #[test]
    fn test_release_all_clears_every_page() {
        let lm = LockManager::new();
        let tid = TransactionId::new();

        for n in 0..5 {
            lm.acquire_exclusive(tid, pid(n)).unwrap();
        }
        assert_eq!(lm.pages_locked_by(tid).len(), 5);

        lm.release_all(tid);
        for n in 0..5 {
            assert!(!lm.holds_lock(tid, pid(n)));
        }
        assert_eq!(lm.tracked_pages(), 0);
    }

    #[test]
    fn test_release_of_unheld_page_is_noop() {
        let lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.release(t1, pid(3));
        lm.acquire_shared(t1, pid(3)).unwrap();
        lm.release(t2, pid(3));
        assert!(lm.holds_lock(t1, pid(3)));
    }

    #[test]
    fn test_blocked_reader_wakes_on_release() {
        let lm = Arc::new(LockManager::new());
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        lm.acquire_exclusive(t1, pid(0)).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || {
                lm.acquire_shared(t2, pid(0)).unwrap();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(lm.is_waiting(t2));

        lm.release_all(t1);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert!(lm.holds_lock(t2, pid(0)));
        assert!(!lm.is_waiting(t2));
    }

    #[test]
    fn test_deadlock_victim_does_not_block() {
        let lm = Arc::new(LockManager::new());
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        lm.acquire_exclusive(t1, pid(0)).unwrap();
        lm.acquire_exclusive(t2, pid(1)).unwrap();

        let handle = {
            let lm = Arc::clone(&lm);
            thread::spawn(move || lm.acquire_exclusive(t1, pid(1)))
        };
        while !lm.is_waiting(t1) {
            thread::sleep(Duration::from_millis(5));
        }

        let err = lm.acquire_exclusive(t2, pid(0)).unwrap_err();
        assert!(matches!(err, SableError::Deadlock { tid, .. } if tid == t2));
        assert!(err.is_transaction_abort());
        assert!(!lm.is_waiting(t2));

        lm.release_all(t2);
        handle.join().unwrap().unwrap();
        assert!(lm.holds_lock(t1, pid(1)));
    }

    #[test]
    fn test_wait_timeout_aborts() {
        let config = LockManagerConfig::default()
            .with_wait_interval(Duration::from_millis(10))
            .with_wait_timeout(Duration::from_millis(50));
        let lm = LockManager::with_config(config);
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_exclusive(t1, pid(0)).unwrap();
        let err = lm.acquire_shared(t2, pid(0)).unwrap_err();
        assert!(matches!(err, SableError::LockWaitTimeout { .. }));
        assert!(!lm.is_waiting(t2));
        assert_eq!(lm.holders(pid(0)), vec![t1]);
    }
}
