//! Owned page buffers.

use std::ops::{Deref, DerefMut};

use super::PAGE_SIZE;

/// A zero-initialized, heap-allocated buffer of exactly `PAGE_SIZE` bytes.
///
/// Buffer pool frames own one `PageData` each; storage backends keep their
/// pages in the same type so page images move between layers by plain copies.
#[derive(Clone)]
pub struct PageData {
    bytes: Box<[u8]>,
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

impl PageData {
    /// Creates a new zeroed page buffer.
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        }
    }

    /// Returns the page contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the page contents mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Zeroes the whole page.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl std::fmt::Debug for PageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageData").field("len", &self.bytes.len()).finish()
    }
}

impl Deref for PageData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for PageData {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl AsRef<[u8]> for PageData {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsMut<[u8]> for PageData {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
