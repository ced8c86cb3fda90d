//! Integration tests for BufferPool.
//!
//! These tests run the buffer pool over files from both the in-memory and
//! the directory file system, including several files sharing one pool.

use heapstore::storage::{
    BufferPool, BufferPoolConfig, BufferPoolError, DirFileSystem, FileManager, FileSystem,
    LruReplacer, MemoryFileSystem, PAGE_SIZE, PageId, Storage,
};
use tempfile::tempdir;

fn pool<S: Storage>(pool_size: usize) -> BufferPool<S> {
    BufferPool::new(LruReplacer::new(pool_size), BufferPoolConfig { pool_size })
}

/// Generic test runner for buffer pool operations.
async fn test_buffer_pool_basic<F: FileSystem>(fs: F) {
    let files = FileManager::new(fs);
    files.create_file("data").await.unwrap();
    let file = files.open_file("data").await.unwrap();
    let bpm = pool::<F::Storage>(10);

    let page_id;
    {
        let mut pin = bpm.alloc_page(&file).await.unwrap();
        page_id = pin.page_id();
        assert_eq!(pin.read().len(), PAGE_SIZE);
        pin.write()[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        pin.mark_dirty();
        pin.release().unwrap();
    }

    bpm.flush_page(file.id(), page_id).await.unwrap();

    // The write reached the file itself.
    let mut buf = vec![0u8; PAGE_SIZE];
    file.storage().read_page(page_id, &mut buf).await.unwrap();
    assert_eq!(buf[..4], [0xDE, 0xAD, 0xBE, 0xEF]);

    let pin = bpm.read_page(&file, page_id).await.unwrap();
    assert_eq!(pin.read()[..4], [0xDE, 0xAD, 0xBE, 0xEF]);
}

#[tokio::test]
async fn test_buffer_pool_with_memory_files() {
    test_buffer_pool_basic(MemoryFileSystem::new()).await;
}

#[tokio::test]
async fn test_buffer_pool_with_dir_files() {
    let dir = tempdir().unwrap();
    test_buffer_pool_basic(DirFileSystem::new(dir.path())).await;
}

/// Eviction writes dirty pages back to the file they belong to.
async fn test_eviction_writes_back<F: FileSystem>(fs: F) {
    let files = FileManager::new(fs);
    files.create_file("a").await.unwrap();
    files.create_file("b").await.unwrap();
    let a = files.open_file("a").await.unwrap();
    let b = files.open_file("b").await.unwrap();
    let bpm = pool::<F::Storage>(2);

    let mut pages = Vec::new();
    for (file, value) in [(&a, 1u8), (&b, 2), (&a, 3), (&b, 4)] {
        let mut pin = bpm.alloc_page(file).await.unwrap();
        pin.write()[0] = value;
        pin.mark_dirty();
        pages.push((file.id(), pin.page_id(), value));
        pin.release().unwrap();
    }
    assert_eq!(bpm.page_count(), 2);

    // Both files number their pages from 0.
    assert_eq!(pages[0].1, PageId::new(0));
    assert_eq!(pages[1].1, PageId::new(0));

    for (file_id, page_id, value) in pages {
        let file = if file_id == a.id() { &a } else { &b };
        let pin = bpm.read_page(file, page_id).await.unwrap();
        assert_eq!(pin.read()[0], value);
    }
}

#[tokio::test]
async fn test_eviction_with_memory_files() {
    test_eviction_writes_back(MemoryFileSystem::new()).await;
}

#[tokio::test]
async fn test_eviction_with_dir_files() {
    let dir = tempdir().unwrap();
    test_eviction_writes_back(DirFileSystem::new(dir.path())).await;
}

#[tokio::test]
async fn test_all_pinned_then_released() {
    let files = FileManager::new(MemoryFileSystem::new());
    files.create_file("f").await.unwrap();
    let file = files.open_file("f").await.unwrap();
    let bpm = pool(3);

    let mut pins = Vec::new();
    for _ in 0..3 {
        pins.push(bpm.alloc_page(&file).await.unwrap());
    }
    assert!(matches!(
        bpm.alloc_page(&file).await,
        Err(BufferPoolError::NoFreeFrames)
    ));
    assert_eq!(file.storage().page_count().await, 3);

    pins.pop().unwrap().release().unwrap();
    let pin = bpm.alloc_page(&file).await.unwrap();
    assert_eq!(pin.page_id(), PageId::new(3));
    assert_eq!(bpm.pinned_count(), 3);
}

/// Many pins of the same pages held at once by interleaved tasks.
#[tokio::test]
async fn test_interleaved_readers() {
    let files = FileManager::new(MemoryFileSystem::new());
    files.create_file("f").await.unwrap();
    let file = files.open_file("f").await.unwrap();
    let bpm = pool(4);

    for value in 0..8u8 {
        let mut pin = bpm.alloc_page(&file).await.unwrap();
        pin.write().fill(value);
        pin.mark_dirty();
        pin.release().unwrap();
    }

    let reader = |start: u64| {
        let bpm = &bpm;
        let file = &file;
        async move {
            for i in 0..16u64 {
                let page_id = PageId::new((start + i) % 8);
                let pin = bpm.read_page(file, page_id).await.unwrap();
                assert!(pin.read().iter().all(|&b| b as u64 == page_id.page_num()));
                tokio::task::yield_now().await;
                pin.release().unwrap();
            }
        }
    };
    tokio::join!(reader(0), reader(3), reader(5));
    assert_eq!(bpm.pinned_count(), 0);
}

#[tokio::test]
async fn test_flush_all_reaches_every_file() {
    let dir = tempdir().unwrap();
    let files = FileManager::new(DirFileSystem::new(dir.path()));
    let bpm = pool(8);

    for name in ["x", "y"] {
        files.create_file(name).await.unwrap();
        let file = files.open_file(name).await.unwrap();
        let mut pin = bpm.alloc_page(&file).await.unwrap();
        pin.write()[100] = name.as_bytes()[0];
        pin.mark_dirty();
        pin.release().unwrap();
        file.close().unwrap();
    }
    bpm.flush_all().await.unwrap();

    // A fresh file system over the same directory sees the data.
    let fs = DirFileSystem::new(dir.path());
    for name in ["x", "y"] {
        let storage = fs.open(name).await.unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        storage.read_page(PageId::new(0), &mut buf).await.unwrap();
        assert_eq!(buf[100], name.as_bytes()[0]);
    }
}
