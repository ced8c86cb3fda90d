//! Buffer pool for caching pages in memory.
//!
//! The buffer pool sits between the storage layer and the heap layer,
//! caching pages of any number of open files in a fixed set of frames.
//!
//! # Components
//!
//! - [`BufferPool`]: Main interface for page access
//! - [`PagePin`]: RAII pin on a cached page, unpinned on release or drop
//! - [`Replacer`]: Trait for page replacement policies
//! - [`LruReplacer`]: LRU (Least Recently Used) implementation
//!
//! # Latch Hierarchy
//!
//! To prevent deadlocks, locks must be acquired in this order:
//! 1. BufferPoolState mutex (page_table, frame_metadata, free_list, replacer)
//! 2. Frame data RwLocks
//!
//! Callers must drop any page data guard obtained from a [`PagePin`] before
//! calling back into the pool.
//!
//! # Example
//!
//! ```no_run
//! use heapstore::storage::{
//!     BufferPool, BufferPoolConfig, FileManager, LruReplacer, MemoryFileSystem, MemoryStorage,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let files = FileManager::new(MemoryFileSystem::new());
//! let config = BufferPoolConfig { pool_size: 16 };
//! let pool: BufferPool<MemoryStorage> = BufferPool::new(LruReplacer::new(config.pool_size), config);
//!
//! files.create_file("t").await?;
//! let file = files.open_file("t").await?;
//!
//! let mut pin = pool.alloc_page(&file).await?;
//! pin.write()[100] = 42;
//! pin.mark_dirty();
//! let page_id = pin.page_id();
//! pin.release()?;
//!
//! let pin = pool.read_page(&file, page_id).await?;
//! assert_eq!(pin.read()[100], 42);
//! # Ok(())
//! # }
//! ```

mod error;
mod frame;
mod pin;
mod pool;
mod replacer;

pub use error::BufferPoolError;
pub use frame::{FrameId, PageKey};
pub use pin::PagePin;
pub use pool::{BufferPool, BufferPoolConfig};
pub use replacer::{LruReplacer, Replacer};
