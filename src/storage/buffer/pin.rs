//! RAII pins on buffered pages.
//!
//! A pin keeps its page resident until it is released, either explicitly
//! through [`PagePin::release`] or when the pin is dropped.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use super::frame::{FrameId, PageKey};
use super::pool::BufferPoolInner;
use super::{BufferPoolError, Replacer};
use crate::storage::{FileId, PageData, PageId, Storage};

/// A pinned page in the buffer pool.
///
/// The dirty flag travels with the pin: [`mark_dirty`](Self::mark_dirty)
/// records that the page was modified, and the flag is applied to the frame
/// when the pin goes away. Pinning the same page twice yields two independent
/// pins, each of which must be released.
///
/// Page bytes are reached through [`read`](Self::read) and
/// [`write`](Self::write). The returned guards must be dropped before the
/// pin is released and before any other buffer pool call.
pub struct PagePin<'a, S: Storage, R: Replacer> {
    inner: &'a BufferPoolInner<S, R>,
    frame_id: FrameId,
    key: PageKey,
    dirty: bool,
}

impl<'a, S: Storage, R: Replacer> PagePin<'a, S, R> {
    pub(super) fn new(inner: &'a BufferPoolInner<S, R>, frame_id: FrameId, key: PageKey) -> Self {
        Self {
            inner,
            frame_id,
            key,
            dirty: false,
        }
    }

    /// Returns the page number of the pinned page.
    pub fn page_id(&self) -> PageId {
        self.key.page
    }

    /// Returns the file the pinned page belongs to.
    pub fn file_id(&self) -> FileId {
        self.key.file
    }

    /// Returns the pool-wide address of the pinned page.
    pub fn key(&self) -> PageKey {
        self.key
    }

    /// Locks the page for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.inner.frame(self.frame_id).read()
    }

    /// Locks the page for writing.
    ///
    /// Writing does not mark the page dirty; call [`mark_dirty`](Self::mark_dirty).
    pub fn write(&self) -> RwLockWriteGuard<'_, PageData> {
        self.inner.frame(self.frame_id).write()
    }

    /// Records that the page was modified.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether this pin will unpin its page as dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Unpins the page, applying the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::PageNotPinned` if the pool no longer holds a
    /// pin on this page.
    pub fn release(self) -> Result<(), BufferPoolError> {
        let result = self.inner.unpin(self.frame_id, self.key, self.dirty);
        std::mem::forget(self);
        result
    }
}

impl<S: Storage, R: Replacer> Drop for PagePin<'_, S, R> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.unpin(self.frame_id, self.key, self.dirty) {
            warn!(page = %self.key, error = %e, "failed to unpin page on drop");
        }
    }
}

impl<S: Storage, R: Replacer> std::fmt::Debug for PagePin<'_, S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePin")
            .field("key", &self.key)
            .field("frame_id", &self.frame_id)
            .field("dirty", &self.dirty)
            .finish()
    }
}
