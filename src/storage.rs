//! Storage layer for page-based I/O.
//!
//! All persistent data is stored in 8KB pages. A file is a dense sequence of
//! pages numbered from 0; pages are only ever reached through the buffer pool,
//! which caches them per `(file, page)` pair.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | Buffer Pool       |  <- buffer (pins, eviction, write-back)
//! +-------------------+
//!          |
//!          v
//! +-------------------+     +-------------------+
//! | Storage Trait     |<----| FileManager       |  <- file (names, open counts)
//! +-------------------+     +-------------------+
//!       /      \                     |
//!      v        v                    v
//! +--------------+ +-------------+  +-------------------+
//! | MemoryStorage| | FileStorage |  | FileSystem Trait  |
//! +--------------+ +-------------+  +-------------------+
//! ```

pub mod buffer;
pub mod error;
pub mod file;
pub mod io;
pub mod page;

pub use buffer::{
    BufferPool, BufferPoolConfig, BufferPoolError, FrameId, LruReplacer, PageKey, PagePin,
    Replacer,
};
pub use error::StorageError;
pub use file::{File, FileId, FileManager, OpenFile};
pub use io::{DirFileSystem, FileStorage, FileSystem, MemoryFileSystem, MemoryStorage, Storage};
pub use page::{PAGE_HEADER_SIZE, PAGE_SIZE, PAGE_VERSION, PageData, PageHeader, PageId, PageType};
