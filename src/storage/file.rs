//! Named files: creation, destruction and reference-counted opens.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::error::StorageError;
use super::io::{FileSystem, Storage};
use super::page::PageId;

/// Identifier of a file within one [`FileManager`].
///
/// A name keeps its id across close and reopen, so pages cached under it stay
/// valid. Destroying the file retires the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    /// Creates a FileId from a raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an open file.
pub struct File<S> {
    id: FileId,
    name: Arc<str>,
    storage: Arc<S>,
}

impl<S> Clone for File<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S> std::fmt::Debug for File<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl<S: Storage> File<S> {
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the page storage of the file.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Returns the number of the file's first page.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the file has no pages.
    pub async fn first_page_id(&self) -> Result<PageId, StorageError> {
        let first = PageId::new(0);
        if self.storage.page_count().await == 0 {
            return Err(StorageError::PageNotFound(first));
        }
        Ok(first)
    }
}

struct OpenEntry<S> {
    storage: Arc<S>,
    open_count: usize,
}

struct FileTable<S> {
    ids: HashMap<String, FileId>,
    open: HashMap<FileId, OpenEntry<S>>,
    next_id: u32,
}

impl<S> FileTable<S> {
    fn id_for(&mut self, name: &str) -> FileId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = FileId::new(self.next_id);
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        id
    }
}

/// Creates, destroys, opens and closes named files of a [`FileSystem`].
///
/// Opening a file that is already open hands out another handle to the same
/// storage and bumps its open count; the file counts as closed once every
/// handle has been closed.
pub struct FileManager<F: FileSystem> {
    fs: F,
    table: Mutex<FileTable<F::Storage>>,
}

impl<F: FileSystem> FileManager<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            table: Mutex::new(FileTable {
                ids: HashMap::new(),
                open: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Returns the underlying file system.
    pub fn file_system(&self) -> &F {
        &self.fs
    }

    /// Creates a new, empty file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileExists` if the name is taken.
    pub async fn create_file(&self, name: &str) -> Result<(), StorageError> {
        self.fs.create(name).await
    }

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileOpen` while any handle to the file is open
    /// - `StorageError::FileNotFound` if no such file exists
    pub async fn destroy_file(&self, name: &str) -> Result<(), StorageError> {
        if self.is_open(name) {
            return Err(StorageError::FileOpen(name.to_string()));
        }
        self.fs.remove(name).await?;
        self.table.lock().ids.remove(name);
        Ok(())
    }

    /// Opens a file, returning a handle that closes it when dropped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if no such file exists.
    pub async fn open_file(&self, name: &str) -> Result<OpenFile<'_, F>, StorageError> {
        if let Some(file) = self.reopen(name) {
            return Ok(OpenFile::new(self, file));
        }

        let storage = self.fs.open(name).await?;

        let mut table = self.table.lock();
        let id = table.id_for(name);
        let entry = table.open.entry(id).or_insert(OpenEntry {
            storage,
            open_count: 0,
        });
        entry.open_count += 1;
        let file = File {
            id,
            name: Arc::from(name),
            storage: entry.storage.clone(),
        };
        Ok(OpenFile::new(self, file))
    }

    fn reopen(&self, name: &str) -> Option<File<F::Storage>> {
        let mut table = self.table.lock();
        let id = *table.ids.get(name)?;
        let entry = table.open.get_mut(&id)?;
        entry.open_count += 1;
        Some(File {
            id,
            name: Arc::from(name),
            storage: entry.storage.clone(),
        })
    }

    /// Closes one handle of an open file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotOpen` if the file has no open handles.
    pub fn close_file(&self, file: &File<F::Storage>) -> Result<(), StorageError> {
        let mut table = self.table.lock();
        let entry = table
            .open
            .get_mut(&file.id)
            .ok_or_else(|| StorageError::FileNotOpen(file.name.to_string()))?;
        entry.open_count -= 1;
        if entry.open_count == 0 {
            table.open.remove(&file.id);
        }
        Ok(())
    }

    /// Returns true while any handle to the named file is open.
    pub fn is_open(&self, name: &str) -> bool {
        let table = self.table.lock();
        table
            .ids
            .get(name)
            .is_some_and(|id| table.open.contains_key(id))
    }

    /// Returns the id the named file is cached under, if it was ever opened.
    pub fn file_id(&self, name: &str) -> Option<FileId> {
        self.table.lock().ids.get(name).copied()
    }
}

/// An open file that is closed when dropped.
///
/// Dereferences to [`File`]. Use [`close`](Self::close) to observe close
/// errors; on drop they are only logged.
pub struct OpenFile<'a, F: FileSystem> {
    manager: &'a FileManager<F>,
    file: File<F::Storage>,
    closed: bool,
}

impl<'a, F: FileSystem> OpenFile<'a, F> {
    fn new(manager: &'a FileManager<F>, file: File<F::Storage>) -> Self {
        Self {
            manager,
            file,
            closed: false,
        }
    }

    /// Closes the file.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.closed = true;
        self.manager.close_file(&self.file)
    }
}

impl<F: FileSystem> Deref for OpenFile<'_, F> {
    type Target = File<F::Storage>;

    fn deref(&self) -> &Self::Target {
        &self.file
    }
}

impl<F: FileSystem> Drop for OpenFile<'_, F> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.manager.close_file(&self.file) {
            warn!(file = %self.file.name, error = %e, "failed to close file on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFileSystem;

    #[tokio::test]
    async fn test_open_close_refcount() {
        let files = FileManager::new(MemoryFileSystem::new());
        files.create_file("f").await.unwrap();
        assert!(!files.is_open("f"));

        let a = files.open_file("f").await.unwrap();
        let b = files.open_file("f").await.unwrap();
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(a.storage(), b.storage()));
        assert!(files.is_open("f"));

        a.close().unwrap();
        assert!(files.is_open("f"));
        drop(b);
        assert!(!files.is_open("f"));
    }

    #[tokio::test]
    async fn test_open_missing() {
        let files = FileManager::new(MemoryFileSystem::new());
        assert!(matches!(
            files.open_file("nope").await,
            Err(StorageError::FileNotFound(_))
        ));
        assert!(files.file_id("nope").is_none());
    }

    #[tokio::test]
    async fn test_id_stable_across_reopen() {
        let files = FileManager::new(MemoryFileSystem::new());
        files.create_file("a").await.unwrap();
        files.create_file("b").await.unwrap();

        let a = files.open_file("a").await.unwrap();
        let id = a.id();
        drop(a);
        let b = files.open_file("b").await.unwrap();
        assert_ne!(b.id(), id);

        let a = files.open_file("a").await.unwrap();
        assert_eq!(a.id(), id);
        assert_eq!(files.file_id("a"), Some(id));
    }

    #[tokio::test]
    async fn test_destroy_open_file() {
        let files = FileManager::new(MemoryFileSystem::new());
        files.create_file("f").await.unwrap();
        let file = files.open_file("f").await.unwrap();

        assert!(matches!(
            files.destroy_file("f").await,
            Err(StorageError::FileOpen(_))
        ));

        file.close().unwrap();
        files.destroy_file("f").await.unwrap();
        assert!(files.file_id("f").is_none());
        assert!(matches!(
            files.destroy_file("f").await,
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_twice() {
        let files = FileManager::new(MemoryFileSystem::new());
        files.create_file("f").await.unwrap();
        let file = files.open_file("f").await.unwrap();
        let copy = (*file).clone();
        file.close().unwrap();

        assert!(matches!(
            files.close_file(&copy),
            Err(StorageError::FileNotOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_first_page_id() {
        let files = FileManager::new(MemoryFileSystem::new());
        files.create_file("f").await.unwrap();
        let file = files.open_file("f").await.unwrap();

        assert!(matches!(
            file.first_page_id().await,
            Err(StorageError::PageNotFound(_))
        ));
        file.storage().allocate_page().await.unwrap();
        assert_eq!(file.first_page_id().await.unwrap(), PageId::new(0));
    }
}
