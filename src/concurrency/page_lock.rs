use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Condvar;

use crate::common::TransactionId;

use super::wait_for_graph::WaitForGraph;

/// Access mode a transaction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Current state of one page's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Unlocked,
    Shared,
    Exclusive,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => write!(f, "UNLOCKED"),
            LockState::Shared => write!(f, "SHARED"),
            LockState::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

/// Lock state machine for a single page.
///
/// | state     | holders            | shared(tid) granted  | exclusive(tid) granted |
/// |-----------|--------------------|----------------------|------------------------|
/// | Unlocked  | {}                 | yes                  | yes                    |
/// | Shared    | one or more        | yes                  | iff holders == {tid}   |
/// | Exclusive | exactly one        | iff holder is tid    | iff holder is tid      |
///
/// A shared request by the exclusive holder leaves the lock exclusive; locks
/// are never downgraded. Every mutation happens while the lock manager's
/// table mutex is held, and the wait-for graph passed in is the manager's.
#[derive(Debug)]
pub(crate) struct PageLock {
    state: LockState,
    holders: HashSet<TransactionId>,
    waiters: HashSet<TransactionId>,
    /// Signalled whenever a holder releases this page
    released: Arc<Condvar>,
}

impl PageLock {
    pub fn new() -> Self {
        Self {
            state: LockState::Unlocked,
            holders: HashSet::new(),
            waiters: HashSet::new(),
            released: Arc::new(Condvar::new()),
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn holds(&self, tid: TransactionId) -> bool {
        self.holders.contains(&tid)
    }

    pub fn holders(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.holders.iter().copied()
    }

    pub fn is_waiting(&self, tid: TransactionId) -> bool {
        self.waiters.contains(&tid)
    }

    /// No holders and no waiters: the lock carries no information.
    pub fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }

    pub fn condvar(&self) -> Arc<Condvar> {
        Arc::clone(&self.released)
    }

    fn can_grant_shared(&self, tid: TransactionId) -> bool {
        self.state != LockState::Exclusive || self.holds(tid)
    }

    fn can_grant_exclusive(&self, tid: TransactionId) -> bool {
        match self.state {
            LockState::Unlocked => true,
            LockState::Exclusive => self.holds(tid),
            LockState::Shared => self.holders.len() == 1 && self.holds(tid),
        }
    }

    /// New holders become blockers of everyone already waiting here.
    fn add_holder(&mut self, tid: TransactionId, graph: &mut WaitForGraph) {
        if self.holders.insert(tid) {
            for &waiter in &self.waiters {
                graph.add_edge(waiter, tid);
            }
        }
    }

    pub fn try_acquire_shared(&mut self, tid: TransactionId, graph: &mut WaitForGraph) -> bool {
        if !self.can_grant_shared(tid) {
            return false;
        }
        if self.state == LockState::Unlocked {
            self.state = LockState::Shared;
        }
        self.add_holder(tid, graph);
        true
    }

    pub fn try_acquire_exclusive(&mut self, tid: TransactionId, graph: &mut WaitForGraph) -> bool {
        if !self.can_grant_exclusive(tid) {
            return false;
        }
        self.state = LockState::Exclusive;
        self.add_holder(tid, graph);
        true
    }

    /// Drops `tid`'s hold, clears the wait-for edges that pointed at it and
    /// wakes every waiter. Returns false if `tid` held nothing here.
    pub fn release(&mut self, tid: TransactionId, graph: &mut WaitForGraph) -> bool {
        if !self.holders.remove(&tid) {
            return false;
        }
        if self.state == LockState::Exclusive {
            self.holders.clear();
        }
        if self.holders.is_empty() {
            self.state = LockState::Unlocked;
        }
        for &waiter in &self.waiters {
            graph.remove_edge(waiter, tid);
        }
        self.released.notify_all();
        true
    }

    /// Marks `tid` as blocked here and points its wait-for edges at the
    /// current holders, replacing any edges from an earlier attempt.
    pub fn register_waiter(&mut self, tid: TransactionId, graph: &mut WaitForGraph) {
        self.waiters.insert(tid);
        graph.clear_waiter(tid);
        for &holder in &self.holders {
            graph.add_edge(tid, holder);
        }
    }

    /// A transaction blocks on one page at a time, so all of its outgoing
    /// edges belong to this lock.
    pub fn unregister_waiter(&mut self, tid: TransactionId, graph: &mut WaitForGraph) {
        self.waiters.remove(&tid);
        graph.clear_waiter(tid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (PageLock, WaitForGraph, TransactionId, TransactionId) {
        (
            PageLock::new(),
            WaitForGraph::default(),
            TransactionId::new(),
            TransactionId::new(),
        )
    }

    #[test]
    fn test_shared_holders_coexist() {
        let (mut lock, mut graph, t1, t2) = setup();

        assert!(lock.try_acquire_shared(t1, &mut graph));
        assert!(lock.try_acquire_shared(t2, &mut graph));
        assert_eq!(lock.state(), LockState::Shared);
        assert_eq!(lock.holders().count(), 2);

        // Idempotent for an existing holder
        assert!(lock.try_acquire_shared(t1, &mut graph));
        assert_eq!(lock.holders().count(), 2);
    }

    #[test]
    fn test_exclusive_excludes_others() {
        let (mut lock, mut graph, t1, t2) = setup();

        assert!(lock.try_acquire_exclusive(t1, &mut graph));
        assert!(!lock.try_acquire_shared(t2, &mut graph));
        assert!(!lock.try_acquire_exclusive(t2, &mut graph));
        assert_eq!(lock.state(), LockState::Exclusive);
    }

    #[test]
    fn test_exclusive_holder_can_read_without_downgrade() {
        let (mut lock, mut graph, t1, _) = setup();

        assert!(lock.try_acquire_exclusive(t1, &mut graph));
        assert!(lock.try_acquire_shared(t1, &mut graph));
        assert_eq!(lock.state(), LockState::Exclusive);
        assert!(lock.try_acquire_exclusive(t1, &mut graph));
    }

    #[test]
    fn test_upgrade_only_for_sole_reader() {
        let (mut lock, mut graph, t1, t2) = setup();

        assert!(lock.try_acquire_shared(t1, &mut graph));
        assert!(lock.try_acquire_exclusive(t1, &mut graph));
        assert_eq!(lock.state(), LockState::Exclusive);

        let (mut lock, mut graph, _, _) = setup();
        assert!(lock.try_acquire_shared(t1, &mut graph));
        assert!(lock.try_acquire_shared(t2, &mut graph));
        assert!(!lock.try_acquire_exclusive(t1, &mut graph));
        assert_eq!(lock.state(), LockState::Shared);
    }

    #[test]
    fn test_release_transitions() {
        let (mut lock, mut graph, t1, t2) = setup();

        lock.try_acquire_shared(t1, &mut graph);
        lock.try_acquire_shared(t2, &mut graph);
        assert!(lock.release(t1, &mut graph));
        assert_eq!(lock.state(), LockState::Shared);
        assert!(lock.release(t2, &mut graph));
        assert_eq!(lock.state(), LockState::Unlocked);
        assert!(lock.is_idle());

        lock.try_acquire_exclusive(t1, &mut graph);
        assert!(lock.release(t1, &mut graph));
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn test_release_by_non_holder_is_noop() {
        let (mut lock, mut graph, t1, t2) = setup();

        lock.try_acquire_exclusive(t1, &mut graph);
        assert!(!lock.release(t2, &mut graph));
        assert_eq!(lock.state(), LockState::Exclusive);
        assert!(lock.holds(t1));
    }

    #[test]
    fn test_waiter_edges_follow_holders() {
        let (mut lock, mut graph, t1, t2) = setup();
        let t3 = TransactionId::new();

        lock.try_acquire_shared(t1, &mut graph);
        lock.register_waiter(t2, &mut graph);
        assert_eq!(graph.blockers(t2), &[t1]);

        // A reader granted while t2 waits also blocks t2
        lock.try_acquire_shared(t3, &mut graph);
        assert!(graph.reaches(t2, t3));

        // Releasing purges the edge to the releaser
        lock.release(t1, &mut graph);
        assert_eq!(graph.blockers(t2), &[t3]);

        lock.unregister_waiter(t2, &mut graph);
        assert!(graph.is_empty());
        assert!(!lock.is_waiting(t2));
    }

    #[test]
    fn test_upgrading_reader_does_not_wait_on_itself() {
        let (mut lock, mut graph, t1, t2) = setup();

        lock.try_acquire_shared(t1, &mut graph);
        lock.try_acquire_shared(t2, &mut graph);
        lock.register_waiter(t1, &mut graph);

        assert_eq!(graph.blockers(t1), &[t2]);
        assert!(!graph.in_cycle(t1));
    }
}
