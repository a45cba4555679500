use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::TransactionId;

/// Directed graph with an edge `a -> b` whenever transaction `a` is blocked
/// on a page that transaction `b` holds.
///
/// Edges are only ever added by a transaction that is about to block, and
/// that transaction checks for a cycle through itself before it does, so the
/// graph at rest is acyclic.
#[derive(Debug, Default)]
pub(crate) struct WaitForGraph {
    edges: HashMap<TransactionId, Vec<TransactionId>>,
}

impl WaitForGraph {
    /// Records that `waiter` waits for `holder`. Self-edges are never stored.
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if waiter == holder {
            return;
        }
        let blockers = self.edges.entry(waiter).or_default();
        if !blockers.contains(&holder) {
            blockers.push(holder);
        }
    }

    pub fn remove_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if let Some(blockers) = self.edges.get_mut(&waiter) {
            blockers.retain(|&tid| tid != holder);
            if blockers.is_empty() {
                self.edges.remove(&waiter);
            }
        }
    }

    /// Drops every outgoing edge of `waiter`.
    pub fn clear_waiter(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Transactions `waiter` is blocked behind, in insertion order.
    pub fn blockers(&self, waiter: TransactionId) -> &[TransactionId] {
        self.edges.get(&waiter).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first search: is there a path of one or more edges from `from` to `to`?
    pub fn reaches(&self, from: TransactionId, to: TransactionId) -> bool {
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);

        while let Some(current) = queue.pop_front() {
            for &next in self.blockers(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// True if `tid` sits on a cycle.
    pub fn in_cycle(&self, tid: TransactionId) -> bool {
        self.reaches(tid, tid)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
