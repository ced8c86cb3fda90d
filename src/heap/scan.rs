//! Filtered sequential scans over a heap file.
//!
//! A [`HeapScan`] walks the data page chain from the first page, visiting
//! occupied slots in slot order and returning the ids of records that pass
//! the scan's filter. The scan can remember one position with
//! [`mark_scan`](HeapScan::mark_scan) and return to it with
//! [`reset_scan`](HeapScan::reset_scan), and can delete the record it is
//! positioned on.

use tracing::debug;

use super::error::HeapError;
use super::file::HeapFile;
use super::filter::{Datatype, Operator, ScanFilter};
use super::page::{HeapPage, RecordId, SlotId};
use crate::db::Database;
use crate::storage::{FileSystem, LruReplacer, PageId, Replacer};

/// A scan over the records of one heap file.
pub struct HeapScan<'a, F: FileSystem, R: Replacer = LruReplacer> {
    heap: HeapFile<'a, F, R>,
    filter: Option<ScanFilter>,
    marked_page_no: Option<PageId>,
    marked_rec: Option<RecordId>,
}

impl<'a, F: FileSystem, R: Replacer> HeapScan<'a, F, R> {
    /// Opens the file and positions the scan before its first record.
    pub async fn open(db: &'a Database<F, R>, name: &str) -> Result<Self, HeapError> {
        let heap = HeapFile::open(db, name).await?;
        Ok(Self {
            marked_page_no: heap.cur_page_no,
            marked_rec: None,
            filter: None,
            heap,
        })
    }

    /// The underlying heap file.
    pub fn file(&self) -> &HeapFile<'a, F, R> {
        &self.heap
    }

    /// Mutable access to the underlying heap file, e.g. for
    /// [`HeapFile::get_record`]. Fetching a record moves the scan's cursor.
    pub fn file_mut(&mut self) -> &mut HeapFile<'a, F, R> {
        &mut self.heap
    }

    pub fn filter(&self) -> Option<&ScanFilter> {
        self.filter.as_ref()
    }

    /// Sets the scan's filter. With `filter` set to `None` every record
    /// matches and the other parameters are ignored.
    ///
    /// The cursor is left where it is.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::BadScanParam` if the parameters are inconsistent;
    /// the previous filter stays in place.
    pub fn start_scan(
        &mut self,
        offset: usize,
        length: usize,
        datatype: Datatype,
        filter: Option<&[u8]>,
        op: Operator,
    ) -> Result<(), HeapError> {
        self.filter = match filter {
            Some(literal) => Some(ScanFilter::new(offset, length, datatype, literal, op)?),
            None => None,
        };
        Ok(())
    }

    /// Advances to the next matching record and returns its id, or `None`
    /// once the last page of the chain has been scanned.
    ///
    /// # Errors
    ///
    /// Propagates failures to unpin the old page or pin the next one. The
    /// cursor then points at the page that could not be pinned, and the
    /// next call retries it.
    pub async fn scan_next(&mut self) -> Result<Option<RecordId>, HeapError> {
        let Some(mut page_no) = self.heap.cur_page_no else {
            return Ok(None);
        };
        if self.heap.cur_page.is_none() {
            self.heap.cur_page = Some(self.heap.pin_page(page_no).await?);
        }

        // Resume after the current record only if it lives on this page.
        let mut prev: Option<SlotId> = self
            .heap
            .cur_rec
            .filter(|rid| rid.page_id == page_no)
            .map(|rid| rid.slot_id);

        loop {
            let (slot, next_page, matched) = {
                let guard = self.heap.cur_pin()?.read();
                let page = HeapPage::new(guard.as_slice());
                let slot = match prev {
                    Some(prev) => page.next_record(prev),
                    None => page.first_record(),
                };
                let matched = match slot {
                    Some(slot) => {
                        let record = page.record(slot)?;
                        self.filter.as_ref().is_none_or(|f| f.matches(record))
                    }
                    None => false,
                };
                (slot, page.next_page(), matched)
            };

            if let Some(slot) = slot {
                if matched {
                    let rid = RecordId::new(page_no, slot);
                    self.heap.cur_rec = Some(rid);
                    return Ok(Some(rid));
                }
                prev = Some(slot);
                continue;
            }

            let next = match next_page {
                Some(next) if page_no != self.heap.header().last_page => next,
                _ => {
                    debug!(
                        file = self.heap.name(),
                        page = %page_no,
                        "heap scan reached end of file"
                    );
                    return Ok(None);
                }
            };
            self.heap.release_current()?;
            self.heap.cur_page_no = Some(next);
            self.heap.cur_page = Some(self.heap.pin_page(next).await?);
            page_no = next;
            prev = None;
        }
    }

    /// Remembers the current position.
    pub fn mark_scan(&mut self) {
        self.marked_page_no = self.heap.cur_page_no;
        self.marked_rec = self.heap.cur_rec;
    }

    /// Returns to the position saved by the last [`mark_scan`](Self::mark_scan),
    /// or to the start of the file if none was saved.
    ///
    /// # Errors
    ///
    /// Propagates failures to unpin the current page or pin the marked one.
    pub async fn reset_scan(&mut self) -> Result<(), HeapError> {
        if self.marked_page_no != self.heap.cur_page_no {
            self.heap.release_current()?;
            self.heap.cur_page_no = self.marked_page_no;
            self.heap.cur_rec = self.marked_rec;
            if let Some(page_no) = self.marked_page_no {
                self.heap.cur_page = Some(self.heap.pin_page(page_no).await?);
            }
        } else {
            self.heap.cur_rec = self.marked_rec;
        }
        Ok(())
    }

    /// Unpins the current page and leaves the cursor exhausted.
    ///
    /// Does nothing if no page is pinned.
    pub fn end_scan(&mut self) -> Result<(), HeapError> {
        if self.heap.cur_page.is_some() {
            self.heap.release_current()?;
            self.heap.cur_page_no = None;
            self.heap.cur_rec = None;
        }
        Ok(())
    }

    /// The id of the record the scan is positioned on.
    pub fn current(&self) -> Option<RecordId> {
        let rid = self.heap.cur_rec?;
        (self.heap.cur_page_no == Some(rid.page_id) && self.heap.cur_page.is_some()).then_some(rid)
    }

    fn current_rid(&self) -> Result<RecordId, HeapError> {
        self.current().ok_or(HeapError::NoCurrentRecord)
    }

    /// Returns a copy of the record the scan is positioned on.
    ///
    /// # Errors
    ///
    /// - `HeapError::NoCurrentRecord` if the scan is not on a record
    /// - `HeapError::SlotNotFound` if that record has been deleted
    pub fn get_record(&self) -> Result<Vec<u8>, HeapError> {
        let rid = self.current_rid()?;
        let guard = self.heap.cur_pin()?.read();
        let record = HeapPage::new(guard.as_slice()).record(rid.slot_id)?.to_vec();
        Ok(record)
    }

    /// Deletes the record the scan is positioned on.
    ///
    /// The scan stays on the emptied slot, so the next
    /// [`scan_next`](Self::scan_next) continues with the following record.
    ///
    /// # Errors
    ///
    /// - `HeapError::NoCurrentRecord` if the scan is not on a record
    /// - `HeapError::SlotNotFound` if that record was already deleted
    pub fn delete_record(&mut self) -> Result<(), HeapError> {
        let rid = self.current_rid()?;
        {
            let mut guard = self.heap.cur_pin()?.write();
            HeapPage::new(guard.as_mut_slice()).delete(rid.slot_id)?;
        }
        self.heap.mark_current_dirty();
        self.heap.update_header(|header| {
            header.record_count = header.record_count.saturating_sub(1);
        });
        Ok(())
    }

    /// Marks the current page dirty, e.g. after the caller changed a record
    /// in place.
    pub fn mark_dirty(&mut self) {
        self.heap.mark_current_dirty();
    }

    /// Ends the scan and closes the file, returning the first failure.
    pub fn close(self) -> Result<(), HeapError> {
        self.heap.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{TestDb, open_test_db};
    use crate::heap::{InsertScan, create_heap_file};
    use crate::storage::MemoryFileSystem;

    fn rec(key: i32, tag: &str) -> Vec<u8> {
        let mut bytes = key.to_le_bytes().to_vec();
        bytes.extend_from_slice(tag.as_bytes());
        bytes
    }

    async fn file_with(db: &TestDb, records: &[Vec<u8>]) -> Vec<RecordId> {
        create_heap_file(db, "t").await.unwrap();
        let mut ins = InsertScan::open(db, "t").await.unwrap();
        let mut rids = Vec::new();
        for record in records {
            rids.push(ins.insert_record(record).await.unwrap());
        }
        ins.close().unwrap();
        rids
    }

    async fn collect(scan: &mut HeapScan<'_, MemoryFileSystem>) -> Vec<RecordId> {
        let mut rids = Vec::new();
        while let Some(rid) = scan.scan_next().await.unwrap() {
            rids.push(rid);
        }
        rids
    }

    #[tokio::test]
    async fn test_unfiltered_scan_returns_all_in_order() {
        let db = open_test_db();
        let records: Vec<_> = (0..10).map(|i| rec(i, "row")).collect();
        let rids = file_with(&db, &records).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        scan.start_scan(0, 0, Datatype::String, None, Operator::Eq)
            .unwrap();
        assert_eq!(collect(&mut scan).await, rids);

        // Exhausted scans stay exhausted.
        assert_eq!(scan.scan_next().await.unwrap(), None);
        scan.close().unwrap();
        assert_eq!(db.pool().pinned_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let db = open_test_db();
        create_heap_file(&db, "t").await.unwrap();
        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        assert_eq!(scan.scan_next().await.unwrap(), None);
        assert!(matches!(scan.get_record(), Err(HeapError::NoCurrentRecord)));
    }

    #[tokio::test]
    async fn test_filtered_scan_across_pages() {
        let db = open_test_db();
        let padding = "x".repeat(1500);
        let records: Vec<_> = (0..20).map(|i| rec(i, &padding)).collect();
        let rids = file_with(&db, &records).await;
        assert!(rids.iter().any(|rid| rid.page_id != rids[0].page_id));

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        scan.start_scan(
            0,
            4,
            Datatype::Integer,
            Some(&10i32.to_le_bytes()),
            Operator::Gte,
        )
        .unwrap();

        let mut keys = Vec::new();
        while let Some(rid) = scan.scan_next().await.unwrap() {
            let record = scan.get_record().unwrap();
            assert_eq!(scan.current(), Some(rid));
            keys.push(i32::from_le_bytes(record[..4].try_into().unwrap()));
        }
        assert_eq!(keys, (10..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_bad_filter_keeps_previous() {
        let db = open_test_db();
        file_with(&db, &[rec(1, "a"), rec(2, "b")]).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        let two = 2i32.to_le_bytes();
        scan.start_scan(0, 4, Datatype::Integer, Some(&two), Operator::Eq)
            .unwrap();
        assert!(matches!(
            scan.start_scan(0, 2, Datatype::Integer, Some(&two), Operator::Eq),
            Err(HeapError::BadScanParam(_))
        ));
        assert_eq!(scan.filter().unwrap().length(), 4);
        assert_eq!(collect(&mut scan).await.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_and_reset() {
        let db = open_test_db();
        let padding = "y".repeat(2000);
        let records: Vec<_> = (0..12).map(|i| rec(i, &padding)).collect();
        let rids = file_with(&db, &records).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        for _ in 0..3 {
            scan.scan_next().await.unwrap();
        }
        scan.mark_scan();
        let after_mark = collect(&mut scan).await;
        assert_eq!(after_mark, rids[3..]);

        scan.reset_scan().await.unwrap();
        assert_eq!(scan.current(), Some(rids[2]));
        assert_eq!(collect(&mut scan).await, after_mark);

        // Resetting to a mark on the current page keeps the pin.
        scan.reset_scan().await.unwrap();
        scan.scan_next().await.unwrap();
        scan.reset_scan().await.unwrap();
        assert_eq!(scan.scan_next().await.unwrap(), Some(rids[3]));
        assert_eq!(db.pool().pinned_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_without_mark_restarts() {
        let db = open_test_db();
        let rids = file_with(&db, &[rec(1, "a"), rec(2, "b")]).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        assert_eq!(collect(&mut scan).await, rids);
        scan.reset_scan().await.unwrap();
        assert_eq!(collect(&mut scan).await, rids);
    }

    #[tokio::test]
    async fn test_delete_during_scan() {
        let db = open_test_db();
        let records: Vec<_> = (0..6).map(|i| rec(i, "row")).collect();
        let rids = file_with(&db, &records).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        assert!(matches!(
            scan.delete_record(),
            Err(HeapError::NoCurrentRecord)
        ));
        while let Some(rid) = scan.scan_next().await.unwrap() {
            if rid.slot_id % 2 == 0 {
                scan.delete_record().unwrap();
                assert!(matches!(
                    scan.get_record(),
                    Err(HeapError::SlotNotFound(_))
                ));
            }
        }
        assert_eq!(scan.file().rec_count(), 3);
        scan.close().unwrap();

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        assert_eq!(scan.file().rec_count(), 3);
        let remaining = collect(&mut scan).await;
        assert_eq!(remaining, vec![rids[1], rids[3], rids[5]]);
    }

    #[tokio::test]
    async fn test_end_scan() {
        let db = open_test_db();
        file_with(&db, &[rec(1, "a")]).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        scan.scan_next().await.unwrap();
        scan.end_scan().unwrap();
        assert_eq!(db.pool().pinned_count(), 1);
        assert!(matches!(scan.get_record(), Err(HeapError::NoCurrentRecord)));
        assert_eq!(scan.scan_next().await.unwrap(), None);

        // A second end is a no-op.
        scan.end_scan().unwrap();
        scan.close().unwrap();
        assert_eq!(db.pool().pinned_count(), 0);
    }

    #[tokio::test]
    async fn test_get_record_by_id_moves_scan() {
        let db = open_test_db();
        let padding = "z".repeat(3000);
        let records: Vec<_> = (0..6).map(|i| rec(i, &padding)).collect();
        let rids = file_with(&db, &records).await;

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        let record = scan.file_mut().get_record(rids[4]).await.unwrap();
        assert_eq!(record, records[4]);
        assert_eq!(scan.current(), Some(rids[4]));
        assert_eq!(scan.scan_next().await.unwrap(), Some(rids[5]));
    }

    #[tokio::test]
    async fn test_scan_sees_inserts_from_another_handle() {
        let db = open_test_db();
        file_with(&db, &[]).await;
        let mut scan = HeapScan::open(&db, "t").await.unwrap();

        let padding = "w".repeat(3000);
        let records: Vec<_> = (0..5).map(|i| rec(i, &padding)).collect();
        let mut ins = InsertScan::open(&db, "t").await.unwrap();
        let mut rids = Vec::new();
        for record in &records {
            rids.push(ins.insert_record(record).await.unwrap());
        }
        let written = ins.file().header();
        ins.close().unwrap();
        assert_eq!(written.page_count, 3);
        assert_eq!(written.last_page, rids[4].page_id);

        // The older handle reads the shared header page, not a stale copy.
        assert_eq!(scan.file().rec_count(), 5);
        assert_eq!(scan.file().header(), written);

        assert_eq!(scan.scan_next().await.unwrap(), Some(rids[0]));
        scan.delete_record().unwrap();
        assert_eq!(collect(&mut scan).await, rids[1..]);
        scan.close().unwrap();

        let file = HeapFile::open(&db, "t").await.unwrap();
        let header = file.header();
        assert_eq!(header.record_count, 4);
        assert_eq!(header.page_count, 3);
        assert_eq!(header.last_page, rids[4].page_id);
        file.close().unwrap();

        let mut scan = HeapScan::open(&db, "t").await.unwrap();
        assert_eq!(collect(&mut scan).await, rids[1..]);
    }
}
