//! Database-level errors.

use crate::storage::{BufferPoolError, StorageError};

/// Errors that can occur during database operations.
#[derive(Debug)]
pub enum DatabaseError {
    /// File or page I/O error.
    Storage(StorageError),
    /// Buffer pool error.
    BufferPool(BufferPoolError),
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseError::Storage(e) => write!(f, "storage error: {}", e),
            DatabaseError::BufferPool(e) => write!(f, "buffer pool error: {}", e),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatabaseError::Storage(e) => Some(e),
            DatabaseError::BufferPool(e) => Some(e),
        }
    }
}

impl From<StorageError> for DatabaseError {
    fn from(e: StorageError) -> Self {
        DatabaseError::Storage(e)
    }
}

impl From<BufferPoolError> for DatabaseError {
    fn from(e: BufferPoolError) -> Self {
        DatabaseError::BufferPool(e)
    }
}
