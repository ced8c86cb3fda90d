//! Errors of the page I/O and file layers.

use crate::storage::PageId;

/// Errors from page stores, file systems and the file manager.
#[derive(Debug)]
pub enum StorageError {
    /// The page lies beyond the end of the file.
    PageNotFound(PageId),

    /// A page buffer was not `PAGE_SIZE` bytes long.
    InvalidBufferSize { expected: usize, actual: usize },

    Io(std::io::Error),

    /// No more pages can be allocated; `MemoryStorage` reports this once its
    /// page limit is reached.
    StorageFull,

    /// A file's size is not a whole number of pages.
    Corrupted(String),

    /// A file with this name already exists.
    FileExists(String),

    /// No file with this name exists.
    FileNotFound(String),

    /// The file is still open and cannot be destroyed.
    FileOpen(String),

    /// The file handle does not belong to an open file.
    FileNotOpen(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::PageNotFound(id) => write!(f, "page not found: {}", id),
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(f, "invalid buffer size: expected {}, got {}", expected, actual)
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::StorageFull => write!(f, "storage is full"),
            StorageError::Corrupted(msg) => write!(f, "data corruption: {}", msg),
            StorageError::FileExists(name) => write!(f, "file already exists: {}", name),
            StorageError::FileNotFound(name) => write!(f, "file not found: {}", name),
            StorageError::FileOpen(name) => write!(f, "file is open: {}", name),
            StorageError::FileNotOpen(name) => write!(f, "file is not open: {}", name),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
