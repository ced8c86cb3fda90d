//! File-backed storage and directory file system.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use super::{FileSystem, Storage};
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

/// Pages of one file on disk, page `n` at byte offset `n * PAGE_SIZE`.
///
/// ```text
/// +------------------+------------------+------------------+
/// | page 0           | page 1           | page 2           | ...
/// +------------------+------------------+------------------+
/// 0                  8192               16384
/// ```
///
/// The handle sits behind a `tokio::sync::Mutex` so that a seek and the
/// transfer after it cannot interleave with another task's. Writes are
/// durable only after [`Storage::sync_all`].
pub struct FileStorage {
    path: PathBuf,
    file: Mutex<TokioFile>,
    page_count: AtomicU64,
}

impl FileStorage {
    /// Opens the file at `path`, creating an empty one if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file is not a whole number
    /// of pages long.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_with(path.into(), true).await
    }

    /// Opens an existing storage file without creating it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` with `NotFound` if the file does not exist,
    /// and `StorageError::Corrupted` on a size that is not page aligned.
    pub async fn open_existing(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::open_with(path.into(), false).await
    }

    async fn open_with(path: PathBuf, create: bool) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(&path)
            .await?;

        let file_size = file.metadata().await?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                file_size, PAGE_SIZE
            )));
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_count: AtomicU64::new(file_size / PAGE_SIZE as u64),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locks the handle and positions it at the start of `page_id`.
    async fn locked_at(&self, page_id: PageId) -> Result<MutexGuard<'_, TokioFile>, StorageError> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(page_id.byte_offset())).await?;
        Ok(file)
    }

    fn check_access(&self, page_id: PageId, len: usize) -> Result<(), StorageError> {
        if len != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: len,
            });
        }
        if page_id.page_num() >= self.page_count.load(Ordering::Acquire) {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_access(page_id, buf.len())?;
        let mut file = self.locked_at(page_id).await?;
        file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        self.check_access(page_id, buf.len())?;
        let mut file = self.locked_at(page_id).await?;
        file.write_all(buf).await?;
        file.flush().await?;
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let page_id = PageId::new(self.page_count.load(Ordering::Acquire));
        let mut file = self.locked_at(page_id).await?;
        file.write_all(&[0u8; PAGE_SIZE]).await?;
        file.flush().await?;

        self.page_count
            .store(page_id.page_num() + 1, Ordering::Release);
        Ok(page_id)
    }

    async fn page_count(&self) -> usize {
        self.page_count.load(Ordering::Acquire) as usize
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }
}

/// Files stored as `<root>/<name>`, one [`FileStorage`] per file.
pub struct DirFileSystem {
    root: PathBuf,
}

impl DirFileSystem {
    /// Uses `root` as the directory files are created in.
    ///
    /// The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory files live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn not_found_as(name: &str, err: StorageError) -> StorageError {
    match err {
        StorageError::Io(e) if e.kind() == ErrorKind::NotFound => {
            StorageError::FileNotFound(name.to_string())
        }
        other => other,
    }
}

impl FileSystem for DirFileSystem {
    type Storage = FileStorage;

    async fn create(&self, name: &str) -> Result<(), StorageError> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(name))
            .await
            .map(|_| ())
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::FileExists(name.to_string()),
                _ => StorageError::Io(e),
            })
    }

    async fn open(&self, name: &str) -> Result<Arc<FileStorage>, StorageError> {
        FileStorage::open_existing(self.path_of(name))
            .await
            .map(Arc::new)
            .map_err(|e| not_found_as(name, e))
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.path_of(name))
            .await
            .map_err(|e| not_found_as(name, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests as generic;
    use super::*;
    use tempfile::{TempDir, tempdir};

    struct TempFileStorage {
        dir: TempDir,
    }

    impl TempFileStorage {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
            }
        }

        async fn storage(&self) -> FileStorage {
            FileStorage::open(self.dir.path().join("test.db"))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let temp = TempFileStorage::new();
        generic::test_basic_operations(temp.storage().await).await;
    }

    #[tokio::test]
    async fn test_buffer_size_validation() {
        let temp = TempFileStorage::new();
        generic::test_buffer_size_validation(temp.storage().await).await;
    }

    #[tokio::test]
    async fn test_page_not_found() {
        let temp = TempFileStorage::new();
        generic::test_page_not_found(temp.storage().await).await;
    }

    #[tokio::test]
    async fn test_corrupted_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        tokio::fs::write(&path, vec![0u8; 100]).await.unwrap();
        let result = FileStorage::open(&path).await;
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_open_existing_missing() {
        let dir = tempdir().unwrap();
        let result = FileStorage::open_existing(dir.path().join("missing.db")).await;
        assert!(matches!(result, Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp = TempFileStorage::new();
        let mut page_ids = Vec::new();

        {
            let storage = temp.storage().await;
            for i in 0..5 {
                page_ids.push(generic::allocate_and_write(&storage, (i * 10) as u8).await);
            }
            storage.sync_all().await.unwrap();
        }

        let storage = temp.storage().await;
        assert_eq!(storage.page_count().await, 5);
        for (i, &page_id) in page_ids.iter().enumerate() {
            generic::verify_test_data(&storage, page_id, (i * 10) as u8).await;
        }
    }

    #[tokio::test]
    async fn test_dir_file_lifecycle() {
        let dir = tempdir().unwrap();
        generic::test_file_lifecycle(DirFileSystem::new(dir.path())).await;
        assert!(!dir.path().join("t").exists());
    }
}
