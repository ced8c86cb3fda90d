//! Integration tests for the storage layer: page stores, file systems and
//! the file manager.

use std::sync::Arc;

use heapstore::storage::{
    DirFileSystem, FileManager, FileStorage, FileSystem, MemoryFileSystem, MemoryStorage,
    PAGE_SIZE, PageId, Storage, StorageError,
};
use tempfile::tempdir;

/// Generic test runner for any Storage implementation.
async fn test_storage_basic_operations<S: Storage>(storage: S) {
    assert_eq!(storage.page_count().await, 0);

    let id0 = storage.allocate_page().await.unwrap();
    let id1 = storage.allocate_page().await.unwrap();
    let id2 = storage.allocate_page().await.unwrap();

    assert_eq!(id0.page_num(), 0);
    assert_eq!(id1.page_num(), 1);
    assert_eq!(id2.page_num(), 2);
    assert_eq!(storage.page_count().await, 3);

    for (id, value) in [(id0, 10u8), (id1, 20u8), (id2, 30u8)] {
        let mut buf = [0u8; PAGE_SIZE];
        buf[0] = value;
        buf[PAGE_SIZE - 1] = value;
        storage.write_page(id, &buf).await.unwrap();
    }

    let mut buf = [0u8; PAGE_SIZE];
    for (id, value) in [(id0, 10u8), (id1, 20u8), (id2, 30u8)] {
        storage.read_page(id, &mut buf).await.unwrap();
        assert_eq!(buf[0], value);
        assert_eq!(buf[PAGE_SIZE - 1], value);
    }

    assert!(matches!(
        storage.read_page(PageId::new(3), &mut buf).await,
        Err(StorageError::PageNotFound(_))
    ));
    storage.sync_all().await.unwrap();
}

#[tokio::test]
async fn test_memory_storage_basic() {
    test_storage_basic_operations(MemoryStorage::new()).await;
}

#[tokio::test]
async fn test_file_storage_basic() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::open(dir.path().join("test.db"))
        .await
        .unwrap();
    test_storage_basic_operations(storage).await;
}

/// Concurrent writers on disjoint pages of one store.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(
        FileStorage::open(dir.path().join("concurrent.db"))
            .await
            .unwrap(),
    );
    for _ in 0..8 {
        storage.allocate_page().await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            let buf = [i as u8 + 1; PAGE_SIZE];
            storage.write_page(PageId::new(i), &buf).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut buf = [0u8; PAGE_SIZE];
    for i in 0..8u64 {
        storage.read_page(PageId::new(i), &mut buf).await.unwrap();
        assert!(buf.iter().all(|&b| b == i as u8 + 1));
    }
}

#[tokio::test]
async fn test_file_storage_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("persist.db");
    {
        let storage = FileStorage::open(&path).await.unwrap();
        let id = storage.allocate_page().await.unwrap();
        storage.write_page(id, &[0xAB; PAGE_SIZE]).await.unwrap();
        storage.sync_all().await.unwrap();
    }

    let storage = FileStorage::open_existing(&path).await.unwrap();
    assert_eq!(storage.page_count().await, 1);
    let mut buf = [0u8; PAGE_SIZE];
    storage.read_page(PageId::new(0), &mut buf).await.unwrap();
    assert_eq!(buf, [0xAB; PAGE_SIZE]);
}

async fn test_file_manager_lifecycle<F: FileSystem>(fs: F) {
    let files = FileManager::new(fs);

    files.create_file("a").await.unwrap();
    assert!(matches!(
        files.create_file("a").await,
        Err(StorageError::FileExists(_))
    ));

    let first = files.open_file("a").await.unwrap();
    let second = files.open_file("a").await.unwrap();
    assert_eq!(first.id(), second.id());
    assert!(Arc::ptr_eq(first.storage(), second.storage()));

    first.storage().allocate_page().await.unwrap();
    assert_eq!(second.first_page_id().await.unwrap(), PageId::new(0));

    assert!(matches!(
        files.destroy_file("a").await,
        Err(StorageError::FileOpen(_))
    ));
    first.close().unwrap();
    assert!(files.is_open("a"));
    second.close().unwrap();
    assert!(!files.is_open("a"));

    let id = files.file_id("a").unwrap();
    let reopened = files.open_file("a").await.unwrap();
    assert_eq!(reopened.id(), id);
    assert_eq!(reopened.storage().page_count().await, 1);
    reopened.close().unwrap();

    files.destroy_file("a").await.unwrap();
    assert_eq!(files.file_id("a"), None);
    assert!(matches!(
        files.open_file("a").await,
        Err(StorageError::FileNotFound(_))
    ));
    assert!(matches!(
        files.destroy_file("a").await,
        Err(StorageError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn test_file_manager_memory() {
    test_file_manager_lifecycle(MemoryFileSystem::new()).await;
}

#[tokio::test]
async fn test_file_manager_dir() {
    let dir = tempdir().unwrap();
    test_file_manager_lifecycle(DirFileSystem::new(dir.path())).await;
    assert!(!dir.path().join("a").exists());
}

#[tokio::test]
async fn test_dir_file_system_sees_existing_files() {
    let dir = tempdir().unwrap();
    {
        let fs = DirFileSystem::new(dir.path());
        fs.create("kept").await.unwrap();
        let storage = fs.open("kept").await.unwrap();
        storage.allocate_page().await.unwrap();
        storage.sync_all().await.unwrap();
    }

    let files = FileManager::new(DirFileSystem::new(dir.path()));
    assert!(matches!(
        files.create_file("kept").await,
        Err(StorageError::FileExists(_))
    ));
    let file = files.open_file("kept").await.unwrap();
    assert_eq!(file.storage().page_count().await, 1);
}
