mod lock_manager;
mod page_lock;
mod transaction;
mod wait_for_graph;

pub use lock_manager::LockManager;
pub use page_lock::{LockMode, LockState};
pub use transaction::Transaction;
