//! Common page header format.
//!
//! Every data page starts with a [`PageHeader`]. The storage I/O layer never
//! interprets it; slotted-page code in `heap` does. Heap file header pages use
//! their own layout but share the [`PageType`] tag at byte 16 so a page can
//! always be told apart by type.

use super::{PAGE_SIZE, PageId};

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 32;

/// Current page layout version.
pub const PAGE_VERSION: u8 = 1;

/// Byte offset of the page type tag, identical for every page layout.
pub(crate) const PAGE_TYPE_OFFSET: usize = 16;

/// Sentinel stored in `next_page` when a page is the end of its chain.
const NO_NEXT_PAGE: u64 = u64::MAX;

/// Page type identifiers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or free page.
    Free = 0,
    /// Slotted data page of a heap file.
    Data = 1,
    /// Heap file header page.
    FileHeader = 2,
}

impl PageType {
    /// Creates a PageType from a raw u8 value.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PageType::Free),
            1 => Some(PageType::Data),
            2 => Some(PageType::FileHeader),
            _ => None,
        }
    }

    /// Reads the type tag of an arbitrary page image.
    pub fn of(page: &[u8]) -> Option<Self> {
        Self::from_u8(page[PAGE_TYPE_OFFSET])
    }
}

/// Header stored at the beginning of each data page.
///
/// Layout (32 bytes, little-endian):
/// - `page_id`: u64 (0..8) - number of this page in its file
/// - `next_page`: u64 (8..16) - next page in the chain, `u64::MAX` if none
/// - `page_type`: u8 (16)
/// - `page_version`: u8 (17)
/// - `slot_count`: u16 (18..20) - slots in the slot array, deleted ones included
/// - `free_start`: u16 (20..22) - end of the slot array
/// - `free_end`: u16 (22..24) - start of the record area
/// - `first_free_slot`: u16 (24..26) - head of the deleted-slot list
/// - reserved (26..32)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Number of this page within its file.
    pub page_id: PageId,
    /// Next page of the chain, if any.
    pub next_page: Option<PageId>,
    /// Type of this page.
    pub page_type: PageType,
    /// Layout version number.
    pub page_version: u8,
    /// Number of slots in the slot array (including deleted slots).
    pub slot_count: u16,
    /// Offset where free space starts (end of slot array).
    pub free_start: u16,
    /// Offset where free space ends (start of record area).
    pub free_end: u16,
    /// Index of first free (deleted) slot, or `u16::MAX` if none.
    pub first_free_slot: u16,
}

impl PageHeader {
    /// Creates a new header for an empty data page.
    pub fn new_data_page(page_id: PageId) -> Self {
        Self {
            page_id,
            next_page: None,
            page_type: PageType::Data,
            page_version: PAGE_VERSION,
            slot_count: 0,
            free_start: PAGE_HEADER_SIZE as u16,
            free_end: PAGE_SIZE as u16,
            first_free_slot: u16::MAX,
        }
    }

    /// Returns the amount of contiguous free space available.
    pub fn free_space(&self) -> u16 {
        self.free_end.saturating_sub(self.free_start)
    }

    /// Reads a header from a page byte slice.
    pub fn read_from(data: &[u8]) -> Self {
        let next_page = read_u64(data, 8);
        Self {
            page_id: PageId::new(read_u64(data, 0)),
            next_page: (next_page != NO_NEXT_PAGE).then_some(PageId::new(next_page)),
            page_type: PageType::from_u8(data[PAGE_TYPE_OFFSET]).unwrap_or(PageType::Free),
            page_version: data[17],
            slot_count: read_u16(data, 18),
            free_start: read_u16(data, 20),
            free_end: read_u16(data, 22),
            first_free_slot: read_u16(data, 24),
        }
    }

    /// Writes the header to a page byte slice.
    pub fn write_to(&self, data: &mut [u8]) {
        let next_page = self.next_page.map_or(NO_NEXT_PAGE, |p| p.page_num());
        data[0..8].copy_from_slice(&self.page_id.page_num().to_le_bytes());
        data[8..16].copy_from_slice(&next_page.to_le_bytes());
        data[PAGE_TYPE_OFFSET] = self.page_type as u8;
        data[17] = self.page_version;
        data[18..20].copy_from_slice(&self.slot_count.to_le_bytes());
        data[20..22].copy_from_slice(&self.free_start.to_le_bytes());
        data[22..24].copy_from_slice(&self.free_end.to_le_bytes());
        data[24..26].copy_from_slice(&self.first_free_slot.to_le_bytes());
        data[26..PAGE_HEADER_SIZE].fill(0);
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), Some(PageType::Free));
        assert_eq!(PageType::from_u8(1), Some(PageType::Data));
        assert_eq!(PageType::from_u8(2), Some(PageType::FileHeader));
        assert_eq!(PageType::from_u8(3), None);
    }

    #[test]
    fn test_new_data_page() {
        let header = PageHeader::new_data_page(PageId::new(5));
        assert_eq!(header.page_id, PageId::new(5));
        assert_eq!(header.next_page, None);
        assert_eq!(header.free_space() as usize, PAGE_SIZE - PAGE_HEADER_SIZE);
    }

    #[test]
    fn test_header_read_write() {
        let mut header = PageHeader::new_data_page(PageId::new(3));
        header.next_page = Some(PageId::new(9));
        header.slot_count = 4;
        header.free_start = 48;
        header.free_end = 8000;
        header.first_free_slot = 2;

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        header.write_to(&mut buf);

        assert_eq!(PageHeader::read_from(&buf), header);
        assert_eq!(PageType::of(&buf), Some(PageType::Data));
        assert!(buf[26..PAGE_HEADER_SIZE].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_end_of_chain_sentinel() {
        let header = PageHeader::new_data_page(PageId::new(1));
        let mut buf = vec![0u8; PAGE_SIZE];
        header.write_to(&mut buf);
        assert_eq!(&buf[8..16], &u64::MAX.to_le_bytes());
        assert_eq!(PageHeader::read_from(&buf).next_page, None);
    }
}
