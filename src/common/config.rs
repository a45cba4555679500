use std::time::Duration;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

/// How long a blocked lock request sleeps before re-checking eligibility
/// when no release wakes it first.
pub const DEFAULT_LOCK_WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning knobs for the lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockManagerConfig {
    /// Upper bound on a single condition wait before the request re-checks.
    pub wait_interval: Duration,
    /// Total time a single acquisition may stay blocked. `None` waits until
    /// granted or chosen as a deadlock victim.
    pub wait_timeout: Option<Duration>,
}

impl LockManagerConfig {
    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            wait_interval: DEFAULT_LOCK_WAIT_INTERVAL,
            wait_timeout: None,
        }
    }
}
