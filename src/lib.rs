//! Heap-file storage over a buffer pool.
//!
//! - [`storage`]: pages, named files and the buffer pool that caches them
//! - [`db`]: the [`Database`](db::Database) handle bundling files and pool
//! - [`heap`]: heap files, scans and inserts

pub mod db;
pub mod heap;
pub mod storage;
