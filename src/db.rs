//! Database handle bundling the file manager and the buffer pool.
//!
//! The [`Database`] type is the entry point heap files are created, opened
//! and destroyed through. It owns the two shared services every heap file
//! needs: named files and the page cache.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------------+
//! |                    Database                    |
//! |                                                |
//! |  +------------------+   +-------------------+  |
//! |  | FileManager<F>   |   | BufferPool<S, R>  |  |
//! |  | (names, opens,   |   | (pins, LRU        |  |
//! |  |  stable FileIds) |   |  eviction)        |  |
//! |  +--------+---------+   +---------+---------+  |
//! |           |                       |            |
//! +-----------+-----------------------+------------+
//!             |                       |
//!             v                       v
//!       +------------+        +------------------+
//!       | FileSystem |------->| Storage per file |
//!       +------------+        +------------------+
//! ```

mod database;
mod error;

pub use database::Database;
pub use error::DatabaseError;
