//! Heap files of variable-length records.
//!
//! A heap file is an unordered collection of records stored in slotted
//! pages. Page 0 is a header page; the data pages form a singly linked
//! chain that only ever grows at its tail.
//!
//! - [`HeapFile`]: an open file with random access by [`RecordId`]
//! - [`HeapScan`]: filtered sequential scans with mark/reset and delete
//! - [`InsertScan`]: appends at the tail of the chain
//! - [`HeapPage`]: the slotted page layout underneath all three

mod error;
mod file;
mod filter;
mod header;
mod insert;
mod page;
mod scan;

pub use error::HeapError;
pub use file::{HeapFile, create_heap_file, destroy_heap_file};
pub use filter::{Datatype, FilterValue, Operator, ScanFilter};
pub use header::{FileHeader, MAX_FILE_NAME_LEN};
pub use insert::InsertScan;
pub use page::{HeapPage, MAX_RECORD_SIZE, RecordId, SLOT_SIZE, SlotEntry, SlotId};
pub use scan::HeapScan;
