//! Appending records to a heap file.

use tracing::debug;

use super::error::HeapError;
use super::file::HeapFile;
use super::page::{HeapPage, MAX_RECORD_SIZE, RecordId};
use crate::db::Database;
use crate::storage::{FileSystem, LruReplacer, Replacer};

/// Inserts records at the tail of a heap file.
///
/// The cursor stays on the last page of the chain. When that page is full a
/// new page is allocated, linked behind it and becomes the new last page.
/// Records are never placed in free space on earlier pages.
pub struct InsertScan<'a, F: FileSystem, R: Replacer = LruReplacer> {
    heap: HeapFile<'a, F, R>,
}

impl<'a, F: FileSystem, R: Replacer> InsertScan<'a, F, R> {
    /// Opens the file and positions the cursor on its last page.
    pub async fn open(db: &'a Database<F, R>, name: &str) -> Result<Self, HeapError> {
        let mut scan = Self {
            heap: HeapFile::open(db, name).await?,
        };
        scan.seek_tail().await?;
        Ok(scan)
    }

    /// The underlying heap file.
    pub fn file(&self) -> &HeapFile<'a, F, R> {
        &self.heap
    }

    pub fn rec_count(&self) -> u64 {
        self.heap.rec_count()
    }

    /// Returns a copy of the record at `rid`. The next insert moves the
    /// cursor back to the last page.
    pub async fn get_record(&mut self, rid: RecordId) -> Result<Vec<u8>, HeapError> {
        self.heap.get_record(rid).await
    }

    /// Pins the last page as the cursor page, unless it already is.
    ///
    /// The tail page is always unpinned dirty.
    async fn seek_tail(&mut self) -> Result<(), HeapError> {
        let last_page = self.heap.header().last_page;
        if self.heap.cur_page_no != Some(last_page) || self.heap.cur_page.is_none() {
            self.heap.release_current()?;
            self.heap.cur_page_no = Some(last_page);
            self.heap.cur_rec = None;
            self.heap.cur_page = Some(self.heap.pin_page(last_page).await?);
        }
        self.heap.mark_current_dirty();
        Ok(())
    }

    /// Appends a record and returns its id.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidRecordLength` if the record cannot fit on an
    ///   empty page; nothing is changed
    /// - pin and allocation failures from the buffer pool
    pub async fn insert_record(&mut self, record: &[u8]) -> Result<RecordId, HeapError> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(HeapError::InvalidRecordLength {
                length: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }
        self.seek_tail().await?;

        let (page_id, inserted) = {
            let pin = self.heap.cur_pin()?;
            let mut guard = pin.write();
            let inserted = HeapPage::new(guard.as_mut_slice()).insert(record);
            (pin.page_id(), inserted)
        };
        let rid = match inserted {
            Ok(slot_id) => RecordId::new(page_id, slot_id),
            Err(HeapError::PageFull { .. }) => self.extend_chain(record).await?,
            Err(err) => return Err(err),
        };

        self.heap.update_header(|header| header.record_count += 1);
        self.heap.cur_rec = Some(rid);
        Ok(rid)
    }

    /// Links a fresh page behind the last page, moves the cursor onto it and
    /// inserts `record` there.
    async fn extend_chain(&mut self, record: &[u8]) -> Result<RecordId, HeapError> {
        let db = self.heap.db;
        let mut new_pin = db.pool().alloc_page(&self.heap.file).await?;
        let new_page = new_pin.page_id();
        HeapPage::new(new_pin.write().as_mut_slice()).init(new_page);
        new_pin.mark_dirty();

        {
            let old = self.heap.cur_pin()?;
            HeapPage::new(old.write().as_mut_slice()).set_next_page(Some(new_page));
        }
        self.heap.mark_current_dirty();
        let header = self.heap.update_header(|header| {
            header.last_page = new_page;
            header.page_count += 1;
        });
        debug!(
            file = %header.name,
            page = %new_page,
            pages = header.page_count,
            "extended heap file"
        );

        self.heap.release_current()?;
        self.heap.cur_page_no = Some(new_page);
        self.heap.cur_page = Some(new_pin);

        let mut guard = self.heap.cur_pin()?.write();
        let slot_id = HeapPage::new(guard.as_mut_slice()).insert(record)?;
        drop(guard);
        Ok(RecordId::new(new_page, slot_id))
    }

    /// Unpins both pages and closes the file, returning the first failure.
    pub fn close(self) -> Result<(), HeapError> {
        self.heap.close()
    }
}
