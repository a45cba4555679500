//! Sable - the transactional page-storage core of a small relational engine
//!
//! This crate stores table tuples on fixed-size heap file pages and
//! serializes concurrent transactions with page-level two-phase locking and
//! wait-for-graph deadlock detection.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Tuples** (`tuple`): Fixed-width typed rows
//!   - `Schema`: Column names, types and byte offsets
//!   - `Tuple`: Values plus the `RecordId` of the slot holding them
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Reads and writes pages to/from disk
//!   - `HeapPage`: Occupancy bitmap followed by fixed-width slots
//!   - `HeapFile`: One table's pages, with first-fit insert and sequential scan
//!
//! - **Concurrency** (`concurrency`): Page locks for transactions
//!   - `LockManager`: Shared/exclusive page locks with deadlock detection
//!   - `Transaction`: Begin/commit/abort handle
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Locks, caches and flushes pages (NO-STEAL/FORCE)
//!   - `ReadPageGuard`/`WritePageGuard`: RAII guards for page access
//!
//! - **Catalog** (`catalog`): Table id to heap file registry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sable::buffer::BufferPoolManager;
//! use sable::catalog::Catalog;
//! use sable::concurrency::{LockManager, Transaction};
//! use sable::storage::table::HeapFile;
//! use sable::tuple::{DataType, Schema, Tuple, Value};
//!
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(16))
//!     .build_arc();
//!
//! let catalog = Arc::new(Catalog::new());
//! let table_id = catalog
//!     .add_table("users", HeapFile::open("users.dat", schema.clone()).unwrap())
//!     .unwrap();
//! let bpm = BufferPoolManager::with_default_size(catalog, Arc::new(LockManager::new()));
//!
//! let txn = Transaction::begin();
//! let mut tuple = Tuple::new(schema, vec![Value::Integer(1), Value::from("alice")]).unwrap();
//! bpm.insert_tuple(txn.id(), table_id, &mut tuple).unwrap();
//! txn.commit(&bpm).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SableError, SlotId, TransactionId};
