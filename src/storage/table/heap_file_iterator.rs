use std::collections::VecDeque;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, SableError, TransactionId};
use crate::tuple::Tuple;

use super::HeapFile;

/// Forward-only scan over every live tuple of a heap file.
///
/// Pages are fetched under a shared lock as the scan reaches them. Each
/// page's tuples are copied out before moving on, so no page latch is held
/// between calls. The scan ends at the page count observed when it gets
/// there; it never grows the file.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    bpm: &'a BufferPoolManager,
    tid: TransactionId,
    /// Next page to load
    next_page: u32,
    /// Tuples of the current page not yet returned
    pending: VecDeque<Tuple>,
    /// Set once the scan is exhausted, closed, or has failed
    done: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub(crate) fn new(file: &'a HeapFile, bpm: &'a BufferPoolManager, tid: TransactionId) -> Self {
        Self {
            file,
            bpm,
            tid,
            next_page: 0,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Restarts the scan from page 0, also after `close`.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.pending.clear();
        self.done = false;
    }

    /// Ends the scan. Later calls return nothing until `rewind`.
    pub fn close(&mut self) {
        self.pending.clear();
        self.done = true;
    }

    /// Whether another tuple is available, loading pages as needed.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        match self.fill() {
            Ok(found) => {
                self.done = !found;
                Ok(found)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    /// Returns the next tuple, or `NoSuchElement` once the scan is over.
    pub fn next_tuple(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(SableError::NoSuchElement);
        }
        self.pending.pop_front().ok_or(SableError::NoSuchElement)
    }

    /// Skips past pages without live tuples. Returns false at end of file.
    fn fill(&mut self) -> Result<bool> {
        while self.pending.is_empty() {
            if self.next_page >= self.file.num_pages()? {
                return Ok(false);
            }
            let page_id = PageId::new(self.file.table_id(), self.next_page);
            self.next_page += 1;
            self.pending = self.file.page_tuples(self.bpm, self.tid, page_id)?.into();
        }
        Ok(true)
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => self.pending.pop_front().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
