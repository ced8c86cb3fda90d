//! Page I/O backends and named-file backends.
//!
//! [`Storage`] is the page-level contract for one file: read, write and
//! allocate 8KB pages. [`FileSystem`] maps file names to storages and is what
//! the file manager creates, opens and removes files through.

mod file;
mod memory;

pub use file::{DirFileSystem, FileStorage};
pub use memory::{MemoryFileSystem, MemoryStorage};

use std::future::Future;
use std::sync::Arc;

use super::page::PageId;
use crate::storage::error::StorageError;

/// Page I/O backend for a single file.
///
/// Storage is responsible for raw page bytes only: it does not cache, and it
/// does not interpret page contents. Caching is the buffer pool's job.
///
/// Implementations must be `Send + Sync`; the buffer pool keeps a handle to
/// each file it caches pages for.
pub trait Storage: Send + Sync {
    /// Reads a page into caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been allocated.
    /// Returns `StorageError::InvalidBufferSize` if `buf.len() != PAGE_SIZE`.
    fn read_page(
        &self,
        page_id: PageId,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Writes a page from caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been allocated.
    /// Returns `StorageError::InvalidBufferSize` if `buf.len() != PAGE_SIZE`.
    fn write_page(
        &self,
        page_id: PageId,
        buf: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Allocates a new zeroed page and returns its PageId.
    ///
    /// Page numbers are handed out sequentially, so the first call on an
    /// empty storage returns `PageId(0)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StorageFull` if storage limit is reached.
    fn allocate_page(&self) -> impl Future<Output = Result<PageId, StorageError>> + Send;

    /// Returns the total number of allocated pages.
    fn page_count(&self) -> impl Future<Output = usize> + Send;

    /// Syncs all pending writes to physical disk (fsync).
    fn sync_all(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Named-file backend: the place files live in.
pub trait FileSystem: Send + Sync {
    /// Page storage of one file.
    type Storage: Storage;

    /// Creates a new, empty file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileExists` if the name is taken.
    fn create(&self, name: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Opens an existing file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if no such file exists.
    fn open(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Arc<Self::Storage>, StorageError>> + Send;

    /// Removes a file and its pages.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if no such file exists.
    fn remove(&self, name: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}
