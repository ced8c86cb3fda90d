//! Error types for the heap module.

use std::fmt;

use crate::db::DatabaseError;
use crate::storage::{BufferPoolError, StorageError};

/// Errors from heap operations.
#[derive(Debug)]
pub enum HeapError {
    /// A heap file with this name already exists.
    FileExists(String),
    /// Scan filter parameters are inconsistent.
    BadScanParam(String),
    /// Record is too large to fit on any page.
    InvalidRecordLength {
        /// Length of the rejected record.
        length: usize,
        /// Largest record a page can hold.
        max: usize,
    },
    /// Page is full, cannot insert data.
    PageFull {
        /// Bytes required for the data and slot.
        required: usize,
        /// Bytes available in free space.
        available: usize,
    },
    /// Slot not found or already deleted.
    SlotNotFound(u16),
    /// The scan is not positioned on a record.
    NoCurrentRecord,
    /// A page does not hold what the heap file expects.
    Corrupted(String),
    /// Buffer pool error.
    BufferPool(BufferPoolError),
    /// File or page I/O error.
    Storage(StorageError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::FileExists(name) => write!(f, "heap file already exists: {}", name),
            HeapError::BadScanParam(msg) => write!(f, "bad scan parameter: {}", msg),
            HeapError::InvalidRecordLength { length, max } => {
                write!(
                    f,
                    "invalid record length: {} bytes exceeds maximum of {}",
                    length, max
                )
            }
            HeapError::PageFull {
                required,
                available,
            } => {
                write!(
                    f,
                    "page full: need {} bytes, have {} available",
                    required, available
                )
            }
            HeapError::SlotNotFound(slot_id) => {
                write!(f, "slot {} not found or deleted", slot_id)
            }
            HeapError::NoCurrentRecord => write!(f, "scan is not positioned on a record"),
            HeapError::Corrupted(msg) => write!(f, "corrupted heap file: {}", msg),
            HeapError::BufferPool(err) => write!(f, "buffer pool error: {}", err),
            HeapError::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::BufferPool(err) => Some(err),
            HeapError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BufferPoolError> for HeapError {
    fn from(err: BufferPoolError) -> Self {
        HeapError::BufferPool(err)
    }
}

impl From<StorageError> for HeapError {
    fn from(err: StorageError) -> Self {
        HeapError::Storage(err)
    }
}

impl From<DatabaseError> for HeapError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Storage(err) => HeapError::Storage(err),
            DatabaseError::BufferPool(err) => HeapError::BufferPool(err),
        }
    }
}
