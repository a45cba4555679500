use bytes::{Bytes, BytesMut};

use crate::common::{Result, SableError, SlotId, PAGE_SIZE};

/// Heap page layout:
///
/// ```text
/// +----------------------------+-----------------------------------------+
/// | occupancy bitmap           | slot 0 | slot 1 | ...  | slot capacity-1 |
/// | ceil(capacity / 8) bytes   | tuple_size bytes each                   |
/// +----------------------------+-----------------------------------------+
/// ```
///
/// Bit `i` (byte `i / 8`, bit `i % 8`, least significant first) is set iff
/// slot `i` holds a live tuple. Slot bytes are meaningless while the bit is
/// clear. Any bytes after the last slot are padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPageLayout {
    tuple_size: usize,
    capacity: usize,
    header_size: usize,
}

impl HeapPageLayout {
    /// Derives the layout for tuples of `tuple_size` bytes: each slot costs
    /// its bytes plus one header bit.
    pub fn new(tuple_size: usize) -> Self {
        let capacity = (PAGE_SIZE * 8) / (tuple_size * 8 + 1);
        Self {
            tuple_size,
            capacity,
            header_size: capacity.div_ceil(8),
        }
    }

    /// Number of tuple slots per page.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of the occupancy bitmap in bytes.
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Size of one tuple slot in bytes.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_size + slot * self.tuple_size;
        start..start + self.tuple_size
    }

    fn check_slot(&self, slot_id: SlotId) -> Result<usize> {
        let slot = slot_id.as_usize();
        if slot >= self.capacity {
            return Err(SableError::InvalidSlotId(slot_id.as_u16()));
        }
        Ok(slot)
    }
}

/// Returns a zeroed page image: every slot free.
pub fn empty_page_data() -> Bytes {
    BytesMut::zeroed(PAGE_SIZE).freeze()
}

fn check_page_len(len: usize) -> Result<()> {
    if len != PAGE_SIZE {
        return Err(SableError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn bit_is_set(data: &[u8], slot: usize) -> bool {
    data[slot / 8] & (1 << (slot % 8)) != 0
}

fn count_empty(data: &[u8], layout: &HeapPageLayout) -> usize {
    (0..layout.capacity)
        .filter(|&slot| !bit_is_set(data, slot))
        .count()
}

fn find_free(data: &[u8], layout: &HeapPageLayout) -> Option<SlotId> {
    (0..layout.capacity)
        .find(|&slot| !bit_is_set(data, slot))
        .map(|slot| SlotId::new(slot as u16))
}

/// Read-only view of a heap page.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
    layout: HeapPageLayout,
}

impl<'a> HeapPageRef<'a> {
    pub fn new(data: &'a [u8], layout: HeapPageLayout) -> Result<Self> {
        check_page_len(data.len())?;
        Ok(Self { data, layout })
    }

    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        let slot = slot_id.as_usize();
        slot < self.layout.capacity && bit_is_set(self.data, slot)
    }

    pub fn num_empty_slots(&self) -> usize {
        count_empty(self.data, &self.layout)
    }

    /// Returns the lowest free slot, if any.
    pub fn first_free_slot(&self) -> Option<SlotId> {
        find_free(self.data, &self.layout)
    }

    /// Occupied slots in ascending order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.layout.capacity)
            .filter(|&slot| bit_is_set(self.data, slot))
            .map(|slot| SlotId::new(slot as u16))
    }

    /// Returns the bytes of a live tuple.
    pub fn tuple_bytes(&self, slot_id: SlotId) -> Result<&'a [u8]> {
        let slot = self.layout.check_slot(slot_id)?;
        if !bit_is_set(self.data, slot) {
            return Err(SableError::EmptySlot(slot_id.as_u16()));
        }
        Ok(&self.data[self.layout.slot_range(slot)])
    }
}

/// Mutable view of a heap page.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
    layout: HeapPageLayout,
}

impl<'a> HeapPage<'a> {
    pub fn new(data: &'a mut [u8], layout: HeapPageLayout) -> Result<Self> {
        check_page_len(data.len())?;
        Ok(Self { data, layout })
    }

    /// Borrows this page as a read-only view.
    pub fn view(&self) -> HeapPageRef<'_> {
        HeapPageRef {
            data: &*self.data,
            layout: self.layout,
        }
    }

    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        self.view().is_slot_used(slot_id)
    }

    pub fn num_empty_slots(&self) -> usize {
        count_empty(self.data, &self.layout)
    }

    pub fn first_free_slot(&self) -> Option<SlotId> {
        find_free(self.data, &self.layout)
    }

    /// Sets or clears the occupancy bit of a slot.
    pub fn mark_slot(&mut self, slot_id: SlotId, used: bool) -> Result<()> {
        let slot = self.layout.check_slot(slot_id)?;
        let mask = 1u8 << (slot % 8);
        if used {
            self.data[slot / 8] |= mask;
        } else {
            self.data[slot / 8] &= !mask;
        }
        Ok(())
    }

    /// Writes `tuple` into the first free slot and marks it occupied.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        if tuple.len() != self.layout.tuple_size {
            return Err(SableError::TupleSizeMismatch {
                expected: self.layout.tuple_size,
                actual: tuple.len(),
            });
        }
        let slot_id = self.first_free_slot().ok_or(SableError::PageFull)?;
        let range = self.layout.slot_range(slot_id.as_usize());
        self.data[range].copy_from_slice(tuple);
        self.mark_slot(slot_id, true)?;
        Ok(slot_id)
    }

    /// Frees a slot. The slot bytes are left in place.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        let slot = self.layout.check_slot(slot_id)?;
        if !bit_is_set(self.data, slot) {
            return Err(SableError::EmptySlot(slot_id.as_u16()));
        }
        self.mark_slot(slot_id, false)
    }
}
