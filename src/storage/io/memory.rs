//! In-memory page storage and file system.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{FileSystem, Storage};
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageData, PageId};

/// In-memory page storage for testing and development.
///
/// Pages live in a `Vec` indexed by page number. All operations complete
/// synchronously; they are `async` only to satisfy [`Storage`].
pub struct MemoryStorage {
    pages: Mutex<Vec<PageData>>,
    /// Optional page limit, for exercising allocation failures.
    max_pages: Option<usize>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: None,
        }
    }

    /// Creates a storage that refuses to grow beyond `max_pages` pages.
    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: Some(max_pages),
        }
    }
}

fn check_buffer(len: usize) -> Result<(), StorageError> {
    if len != PAGE_SIZE {
        return Err(StorageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

impl Storage for MemoryStorage {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer(buf.len())?;
        let pages = self.pages.lock();
        let page = pages
            .get(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;
        buf.copy_from_slice(page.as_slice());
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer(buf.len())?;
        let mut pages = self.pages.lock();
        let page = pages
            .get_mut(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;
        page.as_mut_slice().copy_from_slice(buf);
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut pages = self.pages.lock();
        if self.max_pages.is_some_and(|max| pages.len() >= max) {
            return Err(StorageError::StorageFull);
        }
        let page_id = PageId::new(pages.len() as u64);
        pages.push(PageData::new());
        Ok(page_id)
    }

    async fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Named in-memory files, each backed by a [`MemoryStorage`].
///
/// Opening the same name twice hands out the same storage, so page writes
/// are visible across opens exactly as with an on-disk file.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<String, Arc<MemoryStorage>>>,
    max_pages: Option<usize>,
}

impl MemoryFileSystem {
    /// Creates an empty file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a file system whose files hold at most `max_pages` pages each.
    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            max_pages: Some(max_pages),
        }
    }

    /// Returns true if a file with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }
}

impl FileSystem for MemoryFileSystem {
    type Storage = MemoryStorage;

    async fn create(&self, name: &str) -> Result<(), StorageError> {
        let mut files = self.files.lock();
        if files.contains_key(name) {
            return Err(StorageError::FileExists(name.to_string()));
        }
        let storage = match self.max_pages {
            Some(max) => MemoryStorage::with_max_pages(max),
            None => MemoryStorage::new(),
        };
        files.insert(name.to_string(), Arc::new(storage));
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<Arc<MemoryStorage>, StorageError> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.files
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))
    }
}
