//! Buffer pool for caching pages of many files in memory.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::storage::{File, FileId, PageData, PageId, Storage};

use super::error::BufferPoolError;
use super::frame::{Frame, FrameId, FrameMetadata, PageKey};
use super::pin::PagePin;
use super::replacer::{LruReplacer, Replacer};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the buffer pool.
    ///
    /// This determines the maximum number of pages that can be cached in memory
    /// simultaneously. Common values:
    /// - 128 frames = 1MB (for testing)
    /// - 1024 frames = 8MB (small database)
    /// - 131072 frames = 1GB (production)
    pub pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 1024, // 1024 * 8KB = 8MB
        }
    }
}

/// Buffer pool caching pages of any number of files.
///
/// The pool maintains a fixed number of frames and maps `(file, page)` pairs
/// to them on demand. When all frames are in use, the replacement policy
/// selects an unpinned victim, which is written back first if dirty.
///
/// # Architecture
///
/// ```text
/// +-------------------+
/// |    Heap Files     |
/// +-------------------+
///          |  read_page / alloc_page -> PagePin
///          v
/// +-------------------+
/// |    BufferPool     |  page_table: (FileId, PageId) -> FrameId
/// +-------------------+
///          |
///          v
/// +-------------------+
/// |  Storage (trait)  |  one per open file
/// +-------------------+
/// ```
///
/// # Latch Hierarchy
///
/// 1. State mutex (page_table, frame_metadata, free_list, replacer)
/// 2. Frame data RwLock
///
/// Neither lock is ever held across an `.await`. Page images move between
/// frames and storage through temporary copies.
pub struct BufferPool<S: Storage, R: Replacer = LruReplacer> {
    inner: BufferPoolInner<S, R>,
}

/// Internal state of the buffer pool, shared with pins for unpinning.
pub(super) struct BufferPoolInner<S: Storage, R: Replacer> {
    /// Frame array - each frame's data is protected by its own RwLock.
    frames: Vec<Frame>,

    /// Protected mutable state (page table, metadata, free list, replacer).
    ///
    /// A synchronous mutex so that pins can unpin from `Drop`.
    state: Mutex<BufferPoolState<S, R>>,

    pool_size: usize,
}

/// Mutable state protected by the state mutex.
struct BufferPoolState<S, R> {
    /// Maps (file, page) -> FrameId for quick lookup.
    page_table: HashMap<PageKey, FrameId>,

    /// Metadata for each frame (indexed by FrameId).
    frame_metadata: Vec<FrameMetadata<S>>,

    /// Free frames (not currently holding any page).
    free_list: Vec<FrameId>,

    /// Replacement policy for selecting eviction victims.
    replacer: R,
}

impl<S, R: Replacer> BufferPoolState<S, R> {
    /// Adds a pin to a resident frame.
    fn pin_frame(&mut self, frame_id: FrameId) {
        let meta = &mut self.frame_metadata[frame_id.index()];
        if meta.evicting {
            // Already out of the replacer; cancels the running eviction.
            meta.evicting = false;
        } else if meta.pin_count == 0 {
            self.replacer.pin(frame_id);
        }
        meta.pin_count += 1;
    }

    /// Empties an unpinned frame and returns it to the free list.
    fn drop_frame(&mut self, frame_id: FrameId) {
        let meta = &mut self.frame_metadata[frame_id.index()];
        if let Some(key) = meta.key {
            self.page_table.remove(&key);
        }
        if !meta.evicting {
            self.replacer.pin(frame_id);
        }
        meta.reset();
        self.free_list.push(frame_id);
    }

    /// Resident frames of one file, in page order.
    fn frames_of(&self, file: FileId) -> Vec<(PageKey, FrameId)> {
        let mut frames: Vec<_> = self
            .page_table
            .iter()
            .filter(|(key, _)| key.file == file)
            .map(|(&key, &frame_id)| (key, frame_id))
            .collect();
        frames.sort_by_key(|(key, _)| key.page);
        frames
    }

    /// Fails with `PagePinned` if any page of the file is pinned.
    fn check_unpinned(&self, file: FileId) -> Result<(), BufferPoolError> {
        for (key, frame_id) in self.frames_of(file) {
            if self.frame_metadata[frame_id.index()].pin_count > 0 {
                return Err(BufferPoolError::PagePinned {
                    file: key.file,
                    page: key.page,
                });
            }
        }
        Ok(())
    }
}

/// A dirty page image copied out of its frame, waiting to be written.
struct WriteBack<S> {
    frame_id: FrameId,
    key: PageKey,
    storage: Arc<S>,
    image: PageData,
}

impl<S: Storage, R: Replacer> BufferPool<S, R> {
    /// Creates a new buffer pool.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is 0.
    pub fn new(replacer: R, config: BufferPoolConfig) -> Self {
        let pool_size = config.pool_size;
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<_> = (0..pool_size).map(|_| Frame::new()).collect();
        let frame_metadata: Vec<_> = (0..pool_size).map(|_| FrameMetadata::new()).collect();

        // Reversed so that frames are handed out in ascending order.
        let free_list: Vec<_> = (0..pool_size as u32).rev().map(FrameId::new).collect();

        let state = BufferPoolState {
            page_table: HashMap::with_capacity(pool_size),
            frame_metadata,
            free_list,
            replacer,
        };

        Self {
            inner: BufferPoolInner {
                frames,
                state: Mutex::new(state),
                pool_size,
            },
        }
    }

    /// Pins a page of a file, reading it from storage on a miss.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the pool is full and all pages are pinned
    /// - `BufferPoolError::Storage` if the page doesn't exist or I/O fails
    pub async fn read_page(
        &self,
        file: &File<S>,
        page_id: PageId,
    ) -> Result<PagePin<'_, S, R>, BufferPoolError> {
        let key = PageKey {
            file: file.id(),
            page: page_id,
        };

        {
            let mut state = self.inner.state.lock();
            if let Some(&frame_id) = state.page_table.get(&key) {
                state.pin_frame(frame_id);
                state.frame_metadata[frame_id.index()].storage = Some(file.storage().clone());
                return Ok(PagePin::new(&self.inner, frame_id, key));
            }
        }

        let frame_id = self.inner.allocate_frame().await?;

        let mut image = PageData::new();
        if let Err(e) = file.storage().read_page(page_id, &mut image).await {
            self.inner.state.lock().free_list.push(frame_id);
            return Err(e.into());
        }

        let mut state = self.inner.state.lock();

        // Another task may have loaded this page while we were doing I/O.
        if let Some(&existing) = state.page_table.get(&key) {
            state.free_list.push(frame_id);
            state.pin_frame(existing);
            return Ok(PagePin::new(&self.inner, existing, key));
        }

        self.inner.frames[frame_id.index()]
            .write()
            .copy_from_slice(&image);
        state.page_table.insert(key, frame_id);
        let meta = &mut state.frame_metadata[frame_id.index()];
        meta.key = Some(key);
        meta.storage = Some(file.storage().clone());
        meta.pin_count = 1;
        meta.is_dirty = false;

        Ok(PagePin::new(&self.inner, frame_id, key))
    }

    /// Allocates a new zeroed page at the end of the file and pins it.
    ///
    /// A frame is secured before the page is allocated, so a full pool does
    /// not grow the file.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the pool is full and all pages are pinned
    /// - `BufferPoolError::Storage` if storage allocation fails
    pub async fn alloc_page(&self, file: &File<S>) -> Result<PagePin<'_, S, R>, BufferPoolError> {
        let frame_id = self.inner.allocate_frame().await?;

        let page_id = match file.storage().allocate_page().await {
            Ok(page_id) => page_id,
            Err(e) => {
                self.inner.state.lock().free_list.push(frame_id);
                return Err(e.into());
            }
        };
        let key = PageKey {
            file: file.id(),
            page: page_id,
        };

        let mut state = self.inner.state.lock();
        self.inner.frames[frame_id.index()].write().clear();
        state.page_table.insert(key, frame_id);
        let meta = &mut state.frame_metadata[frame_id.index()];
        meta.key = Some(key);
        meta.storage = Some(file.storage().clone());
        meta.pin_count = 1;
        meta.is_dirty = false;

        Ok(PagePin::new(&self.inner, frame_id, key))
    }

    /// Writes one page back to storage if it is resident and dirty.
    ///
    /// The page stays cached and may be pinned.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if the write fails.
    pub async fn flush_page(&self, file: FileId, page_id: PageId) -> Result<(), BufferPoolError> {
        let key = PageKey {
            file,
            page: page_id,
        };
        let pending = {
            let mut state = self.inner.state.lock();
            match state.page_table.get(&key) {
                Some(&frame_id) => self.inner.take_dirty(&mut state, frame_id),
                None => None,
            }
        };

        if let Some(pending) = pending {
            self.inner.write_back(pending).await?;
        }
        Ok(())
    }

    /// Writes back every page of a file and removes them from the pool.
    ///
    /// Used before a file's cached pages must not outlive it.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::PagePinned` if any page of the file is pinned;
    ///   nothing is written in that case
    /// - `BufferPoolError::Storage` if a write fails
    pub async fn flush_file(&self, file: &File<S>) -> Result<(), BufferPoolError> {
        let pending: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.check_unpinned(file.id())?;
            state
                .frames_of(file.id())
                .into_iter()
                .filter_map(|(_, frame_id)| self.inner.take_dirty(&mut state, frame_id))
                .collect()
        };

        let written = pending.len();
        for pending in pending {
            self.inner.write_back(pending).await?;
        }
        file.storage().sync_all().await?;

        let mut state = self.inner.state.lock();
        let mut dropped = 0;
        for (_, frame_id) in state.frames_of(file.id()) {
            let meta = &state.frame_metadata[frame_id.index()];
            if meta.pin_count == 0 && !meta.is_dirty && !meta.evicting {
                state.drop_frame(frame_id);
                dropped += 1;
            }
        }
        debug!(file = %file.id(), written, dropped, "flushed file");
        Ok(())
    }

    /// Writes back all dirty pages and syncs their storages.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if any write fails.
    pub async fn flush_all(&self) -> Result<(), BufferPoolError> {
        let pending: Vec<_> = {
            let mut state = self.inner.state.lock();
            (0..self.inner.pool_size as u32)
                .map(FrameId::new)
                .filter_map(|frame_id| self.inner.take_dirty(&mut state, frame_id))
                .collect()
        };

        let mut storages: Vec<Arc<S>> = Vec::new();
        for pending in pending {
            if !storages.iter().any(|s| Arc::ptr_eq(s, &pending.storage)) {
                storages.push(pending.storage.clone());
            }
            self.inner.write_back(pending).await?;
        }
        for storage in storages {
            storage.sync_all().await?;
        }
        Ok(())
    }

    /// Drops every cached page of a file without writing anything back.
    ///
    /// Used when the file itself is going away.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::PagePinned` if any page of the file is
    /// pinned; nothing is dropped in that case.
    pub fn discard_file(&self, file: FileId) -> Result<(), BufferPoolError> {
        let mut state = self.inner.state.lock();
        state.check_unpinned(file)?;
        for (_, frame_id) in state.frames_of(file) {
            if !state.frame_metadata[frame_id.index()].evicting {
                state.drop_frame(frame_id);
            }
        }
        Ok(())
    }

    /// Returns the number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Returns the number of pages currently in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.inner.state.lock().page_table.len()
    }

    /// Returns the number of frames with at least one pin.
    pub fn pinned_count(&self) -> usize {
        let state = self.inner.state.lock();
        state
            .frame_metadata
            .iter()
            .filter(|meta| meta.pin_count > 0)
            .count()
    }

    /// Returns the pin count of a page, 0 if it is not resident.
    pub fn pin_count(&self, file: FileId, page_id: PageId) -> u32 {
        let key = PageKey {
            file,
            page: page_id,
        };
        let state = self.inner.state.lock();
        state
            .page_table
            .get(&key)
            .map_or(0, |frame_id| state.frame_metadata[frame_id.index()].pin_count)
    }
}

impl<S: Storage, R: Replacer> BufferPoolInner<S, R> {
    pub(super) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.index()]
    }

    /// Copies out a frame's page image and clears its dirty flag if dirty.
    ///
    /// The flag is cleared before the write so that a pin released as dirty
    /// during the write marks the frame dirty again.
    fn take_dirty(
        &self,
        state: &mut BufferPoolState<S, R>,
        frame_id: FrameId,
    ) -> Option<WriteBack<S>> {
        let meta = &mut state.frame_metadata[frame_id.index()];
        if !meta.is_dirty || meta.evicting {
            return None;
        }
        let key = meta.key?;
        let storage = meta.storage.clone()?;
        meta.is_dirty = false;
        let image = self.frames[frame_id.index()].read().clone();
        Some(WriteBack {
            frame_id,
            key,
            storage,
            image,
        })
    }

    /// Writes a copied page image to its storage.
    ///
    /// On failure the frame is marked dirty again if it still holds the page.
    async fn write_back(&self, pending: WriteBack<S>) -> Result<(), BufferPoolError> {
        let result = pending
            .storage
            .write_page(pending.key.page, &pending.image)
            .await;
        if result.is_err() {
            let mut state = self.state.lock();
            let meta = &mut state.frame_metadata[pending.frame_id.index()];
            if meta.key == Some(pending.key) {
                meta.is_dirty = true;
            }
        }
        result.map_err(BufferPoolError::from)
    }

    /// Allocates a free frame, evicting if necessary.
    async fn allocate_frame(&self) -> Result<FrameId, BufferPoolError> {
        loop {
            let (frame_id, pending) = {
                let mut state = self.state.lock();

                if let Some(frame_id) = state.free_list.pop() {
                    return Ok(frame_id);
                }

                let frame_id = state
                    .replacer
                    .evict()
                    .ok_or(BufferPoolError::NoFreeFrames)?;
                let pending = self.take_dirty(&mut state, frame_id);
                state.frame_metadata[frame_id.index()].evicting = true;
                (frame_id, pending)
            };

            if let Some(pending) = pending {
                debug!(page = %pending.key, "writing back evicted page");
                if let Err(e) = self.write_back(pending).await {
                    let mut state = self.state.lock();
                    let meta = &mut state.frame_metadata[frame_id.index()];
                    if meta.evicting {
                        meta.evicting = false;
                        state.replacer.unpin(frame_id);
                    }
                    return Err(e);
                }
            }

            let mut state = self.state.lock();
            let meta = &state.frame_metadata[frame_id.index()];
            if !meta.evicting {
                // Pinned again during the write; its pins own it now.
                continue;
            }
            if let Some(key) = meta.key {
                state.page_table.remove(&key);
            }
            state.frame_metadata[frame_id.index()].reset();
            return Ok(frame_id);
        }
    }

    /// Unpins a frame (called from PagePin release and drop).
    ///
    /// This is a synchronous operation because Drop is synchronous.
    pub(super) fn unpin(
        &self,
        frame_id: FrameId,
        key: PageKey,
        is_dirty: bool,
    ) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        let meta = &mut state.frame_metadata[frame_id.index()];

        if meta.key != Some(key) || meta.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned {
                file: key.file,
                page: key.page,
            });
        }

        meta.pin_count -= 1;
        if is_dirty {
            meta.is_dirty = true;
        }
        if meta.pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        Ok(())
    }
}
