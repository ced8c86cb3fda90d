//! Page identifier, page buffer and page header primitives.

mod data;
mod header;

pub use data::PageData;
pub use header::{PAGE_HEADER_SIZE, PAGE_VERSION, PageHeader, PageType};
pub(crate) use header::PAGE_TYPE_OFFSET;

/// 8KB page size (aligned with OS page size and PostgreSQL standard).
pub const PAGE_SIZE: usize = 8192;

/// Number of a page within one file.
///
/// Pages are numbered densely from 0 in allocation order, so a `PageId` is
/// also the page's index into the file's page space. Page chains link pages
/// by storing these numbers, never in-memory pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Creates a new PageId from a page number.
    pub const fn new(page_num: u64) -> Self {
        Self(page_num)
    }

    /// Returns the page number.
    pub const fn page_num(&self) -> u64 {
        self.0
    }

    /// Calculates the byte offset for this page in a storage file.
    pub const fn byte_offset(&self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
