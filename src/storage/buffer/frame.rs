//! Buffer pool frame management.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::storage::{FileId, PageData, PageId};

/// Identifier for a frame within the buffer pool.
///
/// FrameId is an index into the pool's frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) u32);

impl FrameId {
    /// Creates a new FrameId.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the frame index.
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Pool-wide address of a page: which file, which page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    /// File the page belongs to.
    pub file: FileId,
    /// Page number within the file.
    pub page: PageId,
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.page)
    }
}

/// A frame in the buffer pool holding one page image.
///
/// Only the page bytes live here; everything else about the frame is kept
/// in [`FrameMetadata`] under the pool's state mutex.
pub(crate) struct Frame {
    data: RwLock<PageData>,
}

impl Frame {
    /// Creates a new empty frame.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(PageData::new()),
        }
    }

    /// Acquires a read lock on the page data.
    pub fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.read()
    }

    /// Acquires a write lock on the page data.
    pub fn write(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.write()
    }
}

/// Bookkeeping for one frame, protected by the pool's state mutex.
pub(crate) struct FrameMetadata<S> {
    /// Page held by the frame, or None if the frame is free.
    pub key: Option<PageKey>,
    /// Storage the page is written back to.
    pub storage: Option<Arc<S>>,
    /// Number of live pins. A frame can only be evicted when this is 0.
    pub pin_count: u32,
    /// Whether the page was modified since it was last written back.
    pub is_dirty: bool,
    /// Set while an eviction writes the page back without the state lock.
    /// Pinning the frame in the meantime clears it and cancels the eviction.
    pub evicting: bool,
}

impl<S> FrameMetadata<S> {
    pub fn new() -> Self {
        Self {
            key: None,
            storage: None,
            pin_count: 0,
            is_dirty: false,
            evicting: false,
        }
    }

    /// Returns the frame to the empty state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
