mod buffer_pool_manager;
mod frame_header;
mod page_guard;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame_header::FrameHeader;
pub use page_guard::{PageGuard, ReadPageGuard, WritePageGuard};
