//! Heap file header page.
//!
//! Page 0 of every heap file. It records where the data page chain starts
//! and ends, how many data pages and records the file holds, and the file's
//! name.

use super::error::HeapError;
use crate::storage::page::PAGE_TYPE_OFFSET;
use crate::storage::{PAGE_VERSION, PageId, PageType};

/// Longest file name stored in the header; longer names are truncated.
pub const MAX_FILE_NAME_LEN: usize = 64;

const NAME_LEN_OFFSET: usize = 18;
const PAGE_COUNT_OFFSET: usize = 24;
const RECORD_COUNT_OFFSET: usize = 32;
const NAME_OFFSET: usize = 40;

/// Contents of a heap file's header page.
///
/// Layout (little-endian):
/// - `first_page`: u64 (0..8)
/// - `last_page`: u64 (8..16)
/// - page type: u8 (16), always `PageType::FileHeader`
/// - page version: u8 (17)
/// - name length: u16 (18..20)
/// - `page_count`: u64 (24..32)
/// - `record_count`: u64 (32..40)
/// - name bytes (40..104)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Name of the file, at most `MAX_FILE_NAME_LEN` bytes once stored.
    pub name: String,
    /// First data page of the chain.
    pub first_page: PageId,
    /// Last data page of the chain, where inserts go.
    pub last_page: PageId,
    /// Number of data pages in the chain.
    pub page_count: u64,
    /// Number of live records in the file.
    pub record_count: u64,
}

impl FileHeader {
    /// Header of a fresh file whose chain is the single page `data_page`.
    pub fn new(name: &str, data_page: PageId) -> Self {
        Self {
            name: name.to_string(),
            first_page: data_page,
            last_page: data_page,
            page_count: 1,
            record_count: 0,
        }
    }

    /// Reads a header from a page image.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::Corrupted` if the page is not a header page.
    pub fn read_from(data: &[u8]) -> Result<Self, HeapError> {
        if PageType::of(data) != Some(PageType::FileHeader) {
            return Err(HeapError::Corrupted(format!(
                "expected a file header page, found type tag {}",
                data[PAGE_TYPE_OFFSET]
            )));
        }

        let name_len = name_len_of(data);
        if name_len > MAX_FILE_NAME_LEN {
            return Err(HeapError::Corrupted(format!(
                "file name length {} exceeds {}",
                name_len, MAX_FILE_NAME_LEN
            )));
        }
        Ok(Self::read_checked(data))
    }

    /// Reads a header from a page that already passed [`read_from`](Self::read_from),
    /// such as a header page that stayed pinned since.
    pub(super) fn read_checked(data: &[u8]) -> Self {
        let name_len = name_len_of(data).min(MAX_FILE_NAME_LEN);
        let name = &data[NAME_OFFSET..NAME_OFFSET + name_len];
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            first_page: PageId::new(read_u64(data, 0)),
            last_page: PageId::new(read_u64(data, 8)),
            page_count: read_u64(data, PAGE_COUNT_OFFSET),
            record_count: read_u64(data, RECORD_COUNT_OFFSET),
        }
    }

    /// Writes the header to a page image.
    pub fn write_to(&self, data: &mut [u8]) {
        let name = self.name.as_bytes();
        let name = &name[..name.len().min(MAX_FILE_NAME_LEN)];

        data[0..8].copy_from_slice(&self.first_page.page_num().to_le_bytes());
        data[8..16].copy_from_slice(&self.last_page.page_num().to_le_bytes());
        data[PAGE_TYPE_OFFSET] = PageType::FileHeader as u8;
        data[PAGE_TYPE_OFFSET + 1] = PAGE_VERSION;
        data[NAME_LEN_OFFSET..NAME_LEN_OFFSET + 2]
            .copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[20..PAGE_COUNT_OFFSET].fill(0);
        data[PAGE_COUNT_OFFSET..PAGE_COUNT_OFFSET + 8]
            .copy_from_slice(&self.page_count.to_le_bytes());
        data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 8]
            .copy_from_slice(&self.record_count.to_le_bytes());
        let name_area = &mut data[NAME_OFFSET..NAME_OFFSET + MAX_FILE_NAME_LEN];
        name_area.fill(0);
        name_area[..name.len()].copy_from_slice(name);
    }
}

fn name_len_of(data: &[u8]) -> usize {
    u16::from_le_bytes([data[NAME_LEN_OFFSET], data[NAME_LEN_OFFSET + 1]]) as usize
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}
