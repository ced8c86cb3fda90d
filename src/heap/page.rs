//! Slotted data pages.
//!
//! ```text
//! 0        32                     free_start       free_end           8192
//! +--------+-----------------------+----------------+-------------------+
//! | header | slot 0 | slot 1 | ... |   free space   | ... | rec 1 | rec 0 |
//! +--------+-----------------------+----------------+-------------------+
//! ```
//!
//! The slot directory grows toward the end of the page and record bytes grow
//! toward its start. A slot keeps its number for the lifetime of its record,
//! so a `(page, slot)` pair is a stable record address. Emptied slots form a
//! free list threaded through the directory and are handed out again before
//! the directory grows. The header also links the page to the next page of
//! its file's chain.

use std::ops::Range;

use super::error::HeapError;
use crate::storage::{PAGE_HEADER_SIZE, PAGE_SIZE, PageHeader, PageId};

/// Bytes taken by one slot directory entry.
pub const SLOT_SIZE: usize = 4;

/// Largest record a data page can hold: the whole page minus the header and
/// the record's own slot.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE - SLOT_SIZE;

/// Number of a slot in a page's slot directory.
pub type SlotId = u16;

/// End of the free slot list.
const NO_FREE_SLOT: SlotId = u16::MAX;

/// One slot directory entry: where a record starts and how long it is.
///
/// An entry with `offset == 0` is empty. Its `length` then holds the next
/// empty slot of the page's free slot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub offset: u16,
    pub length: u16,
}

impl SlotEntry {
    /// An empty entry pointing at the next empty slot.
    pub const fn free(next: SlotId) -> Self {
        Self {
            offset: 0,
            length: next,
        }
    }

    pub const fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Next empty slot; only meaningful on an empty entry.
    pub fn next_free(&self) -> SlotId {
        debug_assert!(self.is_empty());
        self.length
    }

    pub fn read_from(bytes: &[u8]) -> Self {
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Self {
            offset: word(0),
            length: word(2),
        }
    }

    pub fn write_to(&self, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&self.offset.to_le_bytes());
        bytes[2..SLOT_SIZE].copy_from_slice(&self.length.to_le_bytes());
    }

    fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

fn slot_position(slot_id: SlotId) -> Range<usize> {
    let start = PAGE_HEADER_SIZE + slot_id as usize * SLOT_SIZE;
    start..start + SLOT_SIZE
}

/// Address of a record within a heap file.
///
/// Stays valid until the record is deleted. Ordering follows the page
/// chain, then slot order, which is the order scans visit records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub const fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}.{})", self.page_id, self.slot_id)
    }
}

/// View of a data page held in any byte buffer.
///
/// Reading needs `T: AsRef<[u8]>`; changing the page also needs
/// `AsMut<[u8]>`. Buffer pool guards, slices and vectors all qualify.
///
/// # Example
///
/// ```
/// use heapstore::heap::HeapPage;
/// use heapstore::storage::{PAGE_SIZE, PageId};
///
/// let mut data = vec![0u8; PAGE_SIZE];
/// let mut page = HeapPage::new(&mut data);
/// page.init(PageId::new(1));
///
/// let slot_id = page.insert(b"hello world").unwrap();
/// assert_eq!(page.read(slot_id), Some(b"hello world".as_slice()));
/// assert_eq!(page.next_page(), None);
/// ```
pub struct HeapPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> HeapPage<T> {
    /// Wraps a page image.
    ///
    /// # Panics
    ///
    /// Panics unless the buffer is exactly `PAGE_SIZE` bytes.
    pub fn new(data: T) -> Self {
        let len = data.as_ref().len();
        assert!(
            len == PAGE_SIZE,
            "a heap page is {} bytes, got {}",
            PAGE_SIZE,
            len
        );
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.bytes()[..PAGE_HEADER_SIZE])
    }

    /// Page number written by [`init`](Self::init).
    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    /// Following page of the chain; `None` on the last page.
    pub fn next_page(&self) -> Option<PageId> {
        self.header().next_page
    }

    fn slot(&self, slot_id: SlotId) -> SlotEntry {
        SlotEntry::read_from(&self.bytes()[slot_position(slot_id)])
    }

    fn occupied(&self, slot_id: SlotId) -> Option<SlotEntry> {
        if slot_id >= self.header().slot_count {
            return None;
        }
        let entry = self.slot(slot_id);
        (!entry.is_empty()).then_some(entry)
    }

    fn occupied_from(&self, start: SlotId) -> Option<SlotId> {
        (start..self.header().slot_count).find(|&slot_id| self.occupied(slot_id).is_some())
    }

    fn live_bytes(&self) -> usize {
        self.iter().map(|(_, record)| record.len()).sum()
    }

    /// Directory bytes a new record costs: none while an emptied slot is free.
    fn slot_cost(&self) -> usize {
        if self.header().first_free_slot == NO_FREE_SLOT {
            SLOT_SIZE
        } else {
            0
        }
    }

    /// Bytes between the slot directory and the record area.
    pub fn free_space(&self) -> usize {
        self.header().free_space() as usize
    }

    /// Whether a record of `record_size` bytes fits without compaction.
    pub fn can_insert(&self, record_size: usize) -> bool {
        self.free_space() >= record_size + self.slot_cost()
    }

    /// Bytes of an occupied slot; `None` for empty or unknown slots.
    pub fn read(&self, slot_id: SlotId) -> Option<&[u8]> {
        self.occupied(slot_id).map(|entry| &self.bytes()[entry.range()])
    }

    /// Like [`read`](Self::read), reporting a missing record as
    /// `HeapError::SlotNotFound`.
    pub fn record(&self, slot_id: SlotId) -> Result<&[u8], HeapError> {
        self.read(slot_id).ok_or(HeapError::SlotNotFound(slot_id))
    }

    /// Lowest occupied slot.
    pub fn first_record(&self) -> Option<SlotId> {
        self.occupied_from(0)
    }

    /// Lowest occupied slot above `after`, which may itself be empty.
    pub fn next_record(&self, after: SlotId) -> Option<SlotId> {
        self.occupied_from(after.checked_add(1)?)
    }

    /// Share of the record area held by deleted records, from 0.0 to 1.0.
    pub fn fragmentation(&self) -> f32 {
        let area = PAGE_SIZE - self.header().free_end as usize;
        if area == 0 {
            return 0.0;
        }
        area.saturating_sub(self.live_bytes()) as f32 / area as f32
    }

    /// Occupied slots and their records, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &[u8])> {
        (0..self.header().slot_count)
            .filter_map(move |slot_id| Some((slot_id, self.read(slot_id)?)))
    }

    pub fn record_count(&self) -> usize {
        self.iter().count()
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeapPage<T> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn put_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.bytes_mut()[..PAGE_HEADER_SIZE]);
    }

    fn put_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        entry.write_to(&mut self.bytes_mut()[slot_position(slot_id)]);
    }

    /// Turns the page into an empty data page with no successor, wiping
    /// whatever it held before.
    pub fn init(&mut self, page_id: PageId) {
        self.bytes_mut().fill(0);
        self.put_header(&PageHeader::new_data_page(page_id));
    }

    /// Sets or clears the link to the following page.
    pub fn set_next_page(&mut self, next: Option<PageId>) {
        let mut header = self.header();
        header.next_page = next;
        self.put_header(&header);
    }

    /// Stores a record and returns its slot.
    ///
    /// Emptied slots are reused first, most recently emptied first. If the
    /// record only fits once the space of deleted records is reclaimed, the
    /// page is compacted.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::PageFull` if the record does not fit even after
    /// compaction. The page is unchanged in that case.
    pub fn insert(&mut self, record: &[u8]) -> Result<SlotId, HeapError> {
        let required = record.len() + self.slot_cost();
        if self.free_space() < required {
            let reclaimable =
                PAGE_SIZE - self.header().free_start as usize - self.live_bytes();
            if reclaimable < required {
                return Err(HeapError::PageFull {
                    required,
                    available: self.free_space(),
                });
            }
            self.compact();
        }

        let mut header = self.header();
        let slot_id = match header.first_free_slot {
            NO_FREE_SLOT => {
                header.slot_count += 1;
                header.free_start += SLOT_SIZE as u16;
                header.slot_count - 1
            }
            free => {
                header.first_free_slot = self.slot(free).next_free();
                free
            }
        };
        header.free_end -= record.len() as u16;

        let entry = SlotEntry::new(header.free_end, record.len() as u16);
        self.bytes_mut()[entry.range()].copy_from_slice(record);
        self.put_slot(slot_id, entry);
        self.put_header(&header);
        Ok(slot_id)
    }

    /// Empties a slot and pushes it on the free slot list.
    ///
    /// The record's bytes stay in place until the page is compacted.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::SlotNotFound` if the slot holds no record.
    pub fn delete(&mut self, slot_id: SlotId) -> Result<(), HeapError> {
        if self.occupied(slot_id).is_none() {
            return Err(HeapError::SlotNotFound(slot_id));
        }
        let mut header = self.header();
        self.put_slot(slot_id, SlotEntry::free(header.first_free_slot));
        header.first_free_slot = slot_id;
        self.put_header(&header);
        Ok(())
    }

    /// Packs all records against the end of the page, closing the gaps left
    /// by deleted ones.
    ///
    /// Slot numbers do not change. The free slot list is rebuilt in
    /// ascending slot order.
    pub fn compact(&mut self) {
        let live: Vec<(SlotId, Vec<u8>)> = self
            .iter()
            .map(|(slot_id, record)| (slot_id, record.to_vec()))
            .collect();
        let mut header = self.header();

        let mut end = PAGE_SIZE;
        for (slot_id, record) in &live {
            end -= record.len();
            let entry = SlotEntry::new(end as u16, record.len() as u16);
            self.bytes_mut()[entry.range()].copy_from_slice(record);
            self.put_slot(*slot_id, entry);
        }

        let mut next_free = NO_FREE_SLOT;
        for slot_id in (0..header.slot_count).rev() {
            if self.slot(slot_id).is_empty() {
                self.put_slot(slot_id, SlotEntry::free(next_free));
                next_free = slot_id;
            }
        }

        header.free_end = end as u16;
        header.first_free_slot = next_free;
        self.put_header(&header);
    }
}
