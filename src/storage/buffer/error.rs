//! Buffer pool errors.

use crate::storage::{FileId, PageId, StorageError};

/// Buffer pool errors. Failures of the underlying page store are wrapped,
/// not reinterpreted.
#[derive(Debug)]
pub enum BufferPoolError {
    /// Every frame holds a pinned page, so nothing can be evicted.
    NoFreeFrames,

    /// An unpin named a page that is not pinned in the pool.
    PageNotPinned {
        /// File of the page.
        file: FileId,
        /// Page number.
        page: PageId,
    },

    /// A page of the file is still pinned, so the file's pages cannot be
    /// flushed out or discarded.
    PagePinned {
        /// File of the page.
        file: FileId,
        /// Page number.
        page: PageId,
    },

    /// Reading, writing, allocating or syncing a page failed.
    Storage(StorageError),
}

impl std::fmt::Display for BufferPoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferPoolError::NoFreeFrames => {
                write!(f, "buffer pool exhausted: all frames are pinned")
            }
            BufferPoolError::PageNotPinned { file, page } => {
                write!(f, "page {} of file {} is not pinned", page, file)
            }
            BufferPoolError::PagePinned { file, page } => {
                write!(f, "page {} of file {} is still pinned", page, file)
            }
            BufferPoolError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for BufferPoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferPoolError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BufferPoolError {
    fn from(e: StorageError) -> Self {
        BufferPoolError::Storage(e)
    }
}
