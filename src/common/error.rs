use thiserror::Error;

use super::types::{PageId, RecordId, TransactionId};

/// Database error types
#[derive(Error, Debug)]
pub enum SableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tid} aborted: waiting for {page_id} would deadlock")]
    Deadlock { tid: TransactionId, page_id: PageId },

    #[error("{tid} aborted: timed out waiting for {page_id}")]
    LockWaitTimeout { tid: TransactionId, page_id: PageId },

    #[error("{page_id} is out of range, file has {num_pages} pages")]
    PageOutOfRange { page_id: PageId, num_pages: u32 },

    #[error("Invalid page image: expected {expected} bytes, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Tuple size mismatch: expected {expected} bytes, got {actual}")]
    TupleSizeMismatch { expected: usize, actual: usize },

    #[error("Tuples of {0} bytes do not fit on a page")]
    TupleTooLarge(usize),

    #[error("Tuple does not match the table schema")]
    SchemaMismatch,

    #[error("Value for column {column} has the wrong type")]
    TypeMismatch { column: usize },

    #[error("{page_id} does not belong to table {table_id}")]
    WrongTable { page_id: PageId, table_id: u32 },

    #[error("Tuple carries no record id")]
    MissingRecordId,

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    #[error("Record {0} holds a different tuple")]
    TupleMismatch(RecordId),

    #[error("Page is full")]
    PageFull,

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("No more tuples")]
    NoSuchElement,

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Table {0} not found")]
    TableNotFound(u32),
}

impl SableError {
    /// True for errors after which the transaction must be rolled back and
    /// its locks released. Everything else is a failure of one operation.
    pub fn is_transaction_abort(&self) -> bool {
        matches!(
            self,
            SableError::Deadlock { .. } | SableError::LockWaitTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SableError>;
