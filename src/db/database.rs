//! Database handle over a file system and a buffer pool.

use std::path::PathBuf;

use super::error::DatabaseError;
use crate::storage::{
    BufferPool, BufferPoolConfig, DirFileSystem, FileManager, FileSystem, LruReplacer,
    MemoryFileSystem, OpenFile, Replacer, StorageError,
};

/// Database bundles the [`FileManager`] and the [`BufferPool`] that heap
/// files are opened against.
///
/// Every file of the database shares the one pool. A file must be fully
/// unpinned and closed before it can be destroyed.
pub struct Database<F: FileSystem, R: Replacer = LruReplacer> {
    files: FileManager<F>,
    pool: BufferPool<F::Storage, R>,
}

impl<F: FileSystem> Database<F, LruReplacer> {
    /// Creates a database over `fs` with LRU replacement.
    pub fn with_config(fs: F, config: BufferPoolConfig) -> Self {
        let replacer = LruReplacer::new(config.pool_size);
        Self::new(fs, replacer, config)
    }
}

impl Database<MemoryFileSystem, LruReplacer> {
    /// Creates a database whose files live in memory.
    pub fn in_memory(config: BufferPoolConfig) -> Self {
        Self::with_config(MemoryFileSystem::new(), config)
    }
}

impl Database<DirFileSystem, LruReplacer> {
    /// Opens a database whose files live in `path`, creating the directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Storage` if the directory cannot be created.
    pub async fn open_dir(
        path: impl Into<PathBuf>,
        config: BufferPoolConfig,
    ) -> Result<Self, DatabaseError> {
        let path = path.into();
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(StorageError::from)?;
        Ok(Self::with_config(DirFileSystem::new(path), config))
    }
}

impl<F: FileSystem, R: Replacer> Database<F, R> {
    /// Creates a database with a custom replacement policy.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is 0.
    pub fn new(fs: F, replacer: R, config: BufferPoolConfig) -> Self {
        Self {
            files: FileManager::new(fs),
            pool: BufferPool::new(replacer, config),
        }
    }

    /// Returns a reference to the file manager.
    pub fn files(&self) -> &FileManager<F> {
        &self.files
    }

    /// Returns a reference to the buffer pool.
    pub fn pool(&self) -> &BufferPool<F::Storage, R> {
        &self.pool
    }

    /// Creates a new, empty file.
    pub async fn create_file(&self, name: &str) -> Result<(), StorageError> {
        self.files.create_file(name).await
    }

    /// Opens a file.
    pub async fn open_file(&self, name: &str) -> Result<OpenFile<'_, F>, StorageError> {
        self.files.open_file(name).await
    }

    /// Removes a file along with every page of it cached in the pool.
    ///
    /// Cached pages are discarded, not written back.
    ///
    /// # Errors
    ///
    /// - `StorageError::FileOpen` while the file is open
    /// - `StorageError::FileNotFound` if no such file exists
    /// - `BufferPoolError::PagePinned` if a page of the file is still pinned
    pub async fn destroy_file(&self, name: &str) -> Result<(), DatabaseError> {
        if self.files.is_open(name) {
            return Err(StorageError::FileOpen(name.to_string()).into());
        }
        if let Some(id) = self.files.file_id(name) {
            self.pool.discard_file(id)?;
        }
        self.files.destroy_file(name).await?;
        Ok(())
    }

    /// Writes back every dirty page and syncs the files.
    pub async fn flush_all(&self) -> Result<(), DatabaseError> {
        self.pool.flush_all().await?;
        Ok(())
    }
}
