use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, SableError, TransactionId, PAGE_SIZE};
use crate::storage::disk::DiskManager;
use crate::storage::page::{empty_page_data, HeapPage, HeapPageLayout, HeapPageRef};
use crate::tuple::{Schema, Tuple};

use super::HeapFileIterator;

/// HeapFile stores the tuples of one table, in no particular order, on the
/// fixed-size pages of a single file.
///
/// Page reads and writes go straight to disk and are meant for the buffer
/// pool. Tuple-level operations go through a `BufferPoolManager`, which
/// takes the page locks on behalf of the calling transaction.
pub struct HeapFile {
    table_id: u32,
    schema: Arc<Schema>,
    layout: HeapPageLayout,
    disk_manager: DiskManager,
}

impl HeapFile {
    /// Opens (creating if needed) the heap file at `path` for tuples of `schema`.
    ///
    /// The table id is the CRC-32 of the canonical path, so reopening the
    /// same file always yields the same id.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<Schema>) -> Result<Self> {
        if schema.tuple_size() == 0 {
            return Err(SableError::SchemaMismatch);
        }
        let layout = HeapPageLayout::new(schema.tuple_size());
        if layout.capacity() == 0 {
            return Err(SableError::TupleTooLarge(schema.tuple_size()));
        }

        let disk_manager = DiskManager::new(&path)?;
        let canonical = std::fs::canonicalize(&path)?;
        let table_id = crc32fast::hash(canonical.to_string_lossy().as_bytes());

        debug!(
            table_id,
            path = %canonical.display(),
            capacity = layout.capacity(),
            "opened heap file"
        );

        Ok(Self {
            table_id,
            schema,
            layout,
            disk_manager,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn layout(&self) -> HeapPageLayout {
        self.layout
    }

    pub fn path(&self) -> &Path {
        self.disk_manager.path()
    }

    /// Number of pages in the file: `ceil(file_len / PAGE_SIZE)`.
    pub fn num_pages(&self) -> Result<u32> {
        self.disk_manager.num_pages()
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(SableError::WrongTable {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    /// Reads a page image from disk.
    ///
    /// Reading the page just past the end synthesizes an empty page and
    /// persists it, growing the file by one page. Anything further out is
    /// `PageOutOfRange`.
    pub fn read_page(&self, page_id: PageId) -> Result<Bytes> {
        self.check_table(page_id)?;
        let num_pages = self.num_pages()?;

        match page_id.page_no.cmp(&num_pages) {
            Ordering::Less => {
                let mut data = BytesMut::zeroed(PAGE_SIZE);
                self.disk_manager.read_page(page_id.page_no, &mut data)?;
                Ok(data.freeze())
            }
            Ordering::Equal => {
                let data = empty_page_data();
                self.disk_manager.write_page(page_id.page_no, &data)?;
                debug!(%page_id, "grew heap file by one empty page");
                Ok(data)
            }
            Ordering::Greater => Err(SableError::PageOutOfRange {
                page_id,
                num_pages,
            }),
        }
    }

    /// Writes a full page image at its offset, in any order.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_table(page_id)?;
        self.disk_manager.write_page(page_id.page_no, data)
    }

    /// Inserts `tuple` into the first page with a free slot, growing the
    /// file if every page is full, and records the new location in the
    /// tuple. Returns the one page modified.
    ///
    /// Pages are probed under a shared lock first; only the page chosen for
    /// the insert is locked exclusively.
    pub fn insert_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        if **tuple.schema() != *self.schema {
            return Err(SableError::SchemaMismatch);
        }
        let bytes = tuple.to_bytes()?;

        let mut page_no = 0;
        loop {
            let page_id = PageId::new(self.table_id, page_no);
            page_no += 1;

            if page_id.page_no < self.num_pages()? {
                let guard = bpm.fetch_page_shared(tid, page_id)?;
                let has_room = HeapPageRef::new(guard.data(), self.layout)?
                    .first_free_slot()
                    .is_some();
                if !has_room {
                    continue;
                }
            }

            let mut guard = bpm.fetch_page_exclusive(tid, page_id)?;
            // Another transaction may have filled the page before the upgrade
            if HeapPageRef::new(guard.data(), self.layout)?
                .first_free_slot()
                .is_none()
            {
                continue;
            }

            let slot_id = HeapPage::new(guard.data_mut(), self.layout)?.insert_tuple(&bytes)?;
            let record_id = RecordId::new(page_id, slot_id);
            tuple.set_record_id(Some(record_id));
            debug!(%tid, %record_id, "inserted tuple");
            return Ok(vec![page_id]);
        }
    }

    /// Frees the slot named by the tuple's record id. Returns the one page
    /// modified.
    pub fn delete_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>> {
        let record_id = tuple.record_id().ok_or(SableError::MissingRecordId)?;
        let page_id = record_id.page_id;
        self.check_table(page_id)?;
        if page_id.page_no >= self.num_pages()? {
            return Err(SableError::RecordNotFound(record_id));
        }

        let mut guard = bpm.fetch_page_exclusive(tid, page_id)?;
        {
            let page = HeapPageRef::new(guard.data(), self.layout)?;
            if !page.is_slot_used(record_id.slot_id) {
                return Err(SableError::RecordNotFound(record_id));
            }
            if page.tuple_bytes(record_id.slot_id)? != tuple.to_bytes()?.as_slice() {
                return Err(SableError::TupleMismatch(record_id));
            }
        }

        HeapPage::new(guard.data_mut(), self.layout)?.delete_tuple(record_id.slot_id)?;
        debug!(%tid, %record_id, "deleted tuple");
        Ok(vec![page_id])
    }

    /// Decodes every live tuple of one page, in slot order, under a shared lock.
    pub(crate) fn page_tuples(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        page_id: PageId,
    ) -> Result<Vec<Tuple>> {
        let guard = bpm.fetch_page_shared(tid, page_id)?;
        let page = HeapPageRef::new(guard.data(), self.layout)?;

        let tuples = page
            .occupied_slots()
            .map(|slot_id| {
                let bytes = page.tuple_bytes(slot_id)?;
                Ok(Tuple::from_bytes(Arc::clone(&self.schema), bytes)?
                    .with_record_id(RecordId::new(page_id, slot_id)))
            })
            .collect::<Result<Vec<_>>>();
        tuples
    }

    /// Scans every tuple of the file in page-then-slot order on behalf of `tid`.
    pub fn iter<'a>(&'a self, bpm: &'a BufferPoolManager, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, bpm, tid)
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("table_id", &self.table_id)
            .field("path", &self.path())
            .field("layout", &self.layout)
            .finish()
    }
}
