//! Heap files: a header page plus a forward-linked chain of data pages.
//!
//! ```text
//! +-----------+     +-----------+     +-----------+
//! | header    |     | data      |---->| data      |----> ... ----> last_page
//! | (page 0)  |     | first_page|     |           |
//! +-----------+     +-----------+     +-----------+
//!   first_page, last_page, page_count, record_count, name
//! ```
//!
//! An open [`HeapFile`] keeps the header page pinned for its whole lifetime
//! and at most one data page pinned as its cursor. The header is never cached:
//! every handle on the same file pins the same header frame, so reads decode
//! it from the frame and changes are applied to it in place.

use tracing::debug;

use super::error::HeapError;
use super::header::FileHeader;
use super::page::{HeapPage, RecordId};
use crate::db::Database;
use crate::storage::{
    FileId, FileSystem, LruReplacer, OpenFile, PageId, PagePin, PageType, Replacer,
};

/// Creates an empty heap file: a header page and one empty data page.
///
/// # Errors
///
/// - `HeapError::FileExists` if a file with this name can already be opened
/// - file creation and page allocation errors are propagated as is; a file
///   whose initialization failed is left behind
pub async fn create_heap_file<F: FileSystem, R: Replacer>(
    db: &Database<F, R>,
    name: &str,
) -> Result<(), HeapError> {
    if let Ok(file) = db.open_file(name).await {
        file.close()?;
        return Err(HeapError::FileExists(name.to_string()));
    }

    db.create_file(name).await?;
    let file = db.open_file(name).await?;
    let initialized = init_heap_file(db, &file, name).await;
    let closed = file.close();
    initialized?;
    closed?;
    debug!(file = name, "created heap file");
    Ok(())
}

async fn init_heap_file<F: FileSystem, R: Replacer>(
    db: &Database<F, R>,
    file: &OpenFile<'_, F>,
    name: &str,
) -> Result<(), HeapError> {
    let mut header_page = db.pool().alloc_page(file).await?;
    let mut data_page = db.pool().alloc_page(file).await?;
    let first_page = data_page.page_id();

    HeapPage::new(data_page.write().as_mut_slice()).init(first_page);
    FileHeader::new(name, first_page).write_to(header_page.write().as_mut_slice());
    header_page.mark_dirty();
    data_page.mark_dirty();

    header_page.release()?;
    data_page.release()?;
    Ok(())
}

/// Removes a heap file and discards its cached pages.
///
/// # Errors
///
/// Fails with the file layer's error if the file does not exist or is still
/// open.
pub async fn destroy_heap_file<F: FileSystem, R: Replacer>(
    db: &Database<F, R>,
    name: &str,
) -> Result<(), HeapError> {
    db.destroy_file(name).await?;
    debug!(file = name, "destroyed heap file");
    Ok(())
}

/// Pins a page and checks that it is a data page.
async fn pin_data_page<'a, F: FileSystem, R: Replacer>(
    db: &'a Database<F, R>,
    file: &OpenFile<'a, F>,
    page_id: PageId,
) -> Result<PagePin<'a, F::Storage, R>, HeapError> {
    let pin = db.pool().read_page(file, page_id).await?;
    let page_type = PageType::of(&pin.read());
    if page_type != Some(PageType::Data) {
        return Err(HeapError::Corrupted(format!(
            "page {} of {} is not a data page",
            page_id,
            file.name()
        )));
    }
    Ok(pin)
}

/// An open heap file.
///
/// Holds the header page pinned, plus the current data page while the
/// cursor is positioned. Dropping the file unpins both pages and closes the
/// file; [`close`](Self::close) does the same and reports failures.
pub struct HeapFile<'a, F: FileSystem, R: Replacer = LruReplacer> {
    // Field order is drop order: data page, header page, then the file.
    pub(super) cur_page: Option<PagePin<'a, F::Storage, R>>,
    pub(super) header_page: PagePin<'a, F::Storage, R>,
    pub(super) file: OpenFile<'a, F>,
    pub(super) db: &'a Database<F, R>,
    /// Page the cursor is on; None once the cursor is exhausted.
    pub(super) cur_page_no: Option<PageId>,
    pub(super) cur_rec: Option<RecordId>,
}

impl<'a, F: FileSystem, R: Replacer> HeapFile<'a, F, R> {
    /// Opens a heap file, pinning its header page and first data page.
    ///
    /// # Errors
    ///
    /// Propagates open and pin failures. Pages pinned before the failure are
    /// unpinned and the file is closed again.
    pub async fn open(db: &'a Database<F, R>, name: &str) -> Result<Self, HeapError> {
        let file = db.open_file(name).await?;
        let header_page_no = file.first_page_id().await?;
        let header_page = db.pool().read_page(&file, header_page_no).await?;
        let header = FileHeader::read_from(&header_page.read())?;
        let cur_page = pin_data_page(db, &file, header.first_page).await?;

        debug!(
            file = name,
            records = header.record_count,
            pages = header.page_count,
            "opened heap file"
        );
        Ok(Self {
            cur_page_no: Some(header.first_page),
            cur_page: Some(cur_page),
            cur_rec: None,
            header_page,
            file,
            db,
        })
    }

    /// Unpins both pages with their dirty flags and closes the file.
    ///
    /// Every step is attempted; the first failure is returned.
    pub fn close(self) -> Result<(), HeapError> {
        let HeapFile {
            cur_page,
            header_page,
            file,
            ..
        } = self;

        let name = file.name().to_string();
        let data = cur_page.map_or(Ok(()), PagePin::release);
        let hdr = header_page.release();
        let closed = file.close();
        debug!(file = %name, "closed heap file");

        data?;
        hdr?;
        closed?;
        Ok(())
    }

    /// Number of records in the file.
    pub fn rec_count(&self) -> u64 {
        self.header().record_count
    }

    /// Current contents of the header page, including changes made through
    /// other handles on the same file.
    pub fn header(&self) -> FileHeader {
        FileHeader::read_checked(&self.header_page.read())
    }

    /// Name the file was opened under.
    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn file_id(&self) -> FileId {
        self.file.id()
    }

    /// Returns a copy of the record at `rid`.
    ///
    /// If the record is on another page than the cursor, the cursor page is
    /// unpinned and the cursor moves to the record's page.
    ///
    /// # Errors
    ///
    /// - `HeapError::SlotNotFound` if the slot holds no record
    /// - pin failures, including a page that is not a data page
    pub async fn get_record(&mut self, rid: RecordId) -> Result<Vec<u8>, HeapError> {
        if self.cur_page_no == Some(rid.page_id)
            && let Some(pin) = &self.cur_page
        {
            return Ok(HeapPage::new(pin.read().as_slice())
                .record(rid.slot_id)?
                .to_vec());
        }

        self.release_current()?;
        self.cur_page_no = Some(rid.page_id);
        self.cur_rec = Some(rid);
        self.cur_page = Some(self.pin_page(rid.page_id).await?);

        let pin = self.cur_pin()?;
        let record = HeapPage::new(pin.read().as_slice())
            .record(rid.slot_id)?
            .to_vec();
        Ok(record)
    }

    pub(super) async fn pin_page(
        &self,
        page_id: PageId,
    ) -> Result<PagePin<'a, F::Storage, R>, HeapError> {
        pin_data_page(self.db, &self.file, page_id).await
    }

    /// The pinned cursor page.
    pub(super) fn cur_pin(&self) -> Result<&PagePin<'a, F::Storage, R>, HeapError> {
        self.cur_page.as_ref().ok_or(HeapError::NoCurrentRecord)
    }

    /// Unpins the cursor page, if any, with its dirty flag.
    pub(super) fn release_current(&mut self) -> Result<(), HeapError> {
        if let Some(pin) = self.cur_page.take() {
            pin.release()?;
        }
        Ok(())
    }

    pub(super) fn mark_current_dirty(&mut self) {
        if let Some(pin) = self.cur_page.as_mut() {
            pin.mark_dirty();
        }
    }

    /// Applies a change to the header page in place and returns the result.
    pub(super) fn update_header(&mut self, change: impl FnOnce(&mut FileHeader)) -> FileHeader {
        let header = {
            let mut guard = self.header_page.write();
            let mut header = FileHeader::read_checked(guard.as_slice());
            change(&mut header);
            header.write_to(guard.as_mut_slice());
            header
        };
        self.header_page.mark_dirty();
        header
    }
}
