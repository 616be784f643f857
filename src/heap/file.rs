//! Heap file lifecycle and the open-file handle.

use crate::buffer::{BufferPool, PagePin, Replacer};
use crate::storage::{FileId, PageTag, Storage};

use super::cursor::Cursor;
use super::error::HeapFileError;
use super::header::FileHeader;
use super::page::{DataPage, RecordId};
use super::scan::HeapFileScan;
use super::writer::HeapFileWriter;

/// Creates a heap file named `name`.
///
/// Allocates the header page followed by one empty data page, so a fresh
/// file's chain is never empty. Both pages are written back through the
/// pool; the file is closed before returning.
///
/// # Errors
///
/// Returns `HeapFileError::FileExists` if the name is taken.
pub async fn create<S: Storage, R: Replacer>(
    pool: &BufferPool<S, R>,
    name: &str,
) -> Result<(), HeapFileError> {
    let storage = pool.storage();
    storage.create_file(name).await?;
    let file = storage.open_file(name).await?;

    let result = write_initial_pages(pool, file, name).await;
    if let Err(close_err) = storage.close_file(file) {
        eprintln!("heap create: closing {name} failed: {close_err}");
    }
    result
}

/// Lays out the header page and the initial data page of a new file.
async fn write_initial_pages<S: Storage, R: Replacer>(
    pool: &BufferPool<S, R>,
    file: FileId,
    name: &str,
) -> Result<(), HeapFileError> {
    let mut header_pin = pool.alloc_page(file).await?;
    let mut data_pin = pool.alloc_page(file).await?;
    let data_page_no = data_pin.page_no();

    {
        let mut page = data_pin.page_mut().await;
        DataPage::new(&mut *page).init();
    }
    {
        let mut page = header_pin.page_mut().await;
        FileHeader::new(name, data_page_no).write_to(page.as_mut_slice());
    }

    data_pin.release();
    header_pin.release();
    Ok(())
}

/// Destroys the heap file named `name`.
///
/// After the file is removed, the pool's cached frames for it are
/// discarded: a destroyed file's pages must never be written back. A
/// destroy refused because the file is open leaves its frames untouched.
///
/// # Errors
///
/// Fails if the file does not exist or is still open.
pub async fn destroy<S: Storage, R: Replacer>(
    pool: &BufferPool<S, R>,
    name: &str,
) -> Result<(), HeapFileError> {
    let storage = pool.storage();
    let file = storage.open_file(name).await?;
    storage.close_file(file)?;

    storage.destroy_file(name).await?;
    pool.discard_file(file)?;
    Ok(())
}

/// An open heap file.
///
/// The handle pins the file's header page for its whole lifetime, caching
/// the decoded [`FileHeader`] in memory; every header mutation is written
/// straight back into the pinned frame, so the frame is dirty exactly when
/// a header field changed. At most one data page is pinned at a time, as
/// the cursor shared by the [`scan`](Self::scan) and
/// [`writer`](Self::writer) views.
///
/// Dropping the handle releases the cursor pin, releases the header pin,
/// and closes the file; teardown failures are reported on the diagnostic
/// stream rather than panicking.
pub struct HeapFile<'p, S: Storage, R: Replacer> {
    pub(super) pool: &'p BufferPool<S, R>,
    pub(super) file: FileId,
    pub(super) header_pin: Option<PagePin<'p, S, R>>,
    pub(super) header: FileHeader,
    pub(super) cursor: Cursor<'p, S, R>,
}

impl<'p, S: Storage, R: Replacer> HeapFile<'p, S, R> {
    /// Opens the heap file named `name`.
    ///
    /// Pins the header page, validates it, and pins the first data page as
    /// the initial cursor position.
    pub async fn open(
        pool: &'p BufferPool<S, R>,
        name: &str,
    ) -> Result<HeapFile<'p, S, R>, HeapFileError> {
        let storage = pool.storage();
        let file = storage.open_file(name).await?;

        match Self::pin_and_decode(pool, file).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                // Pins taken so far release themselves; the file must not
                // stay open.
                if let Err(close_err) = storage.close_file(file) {
                    eprintln!("heap open: closing {name} failed: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn pin_and_decode(
        pool: &'p BufferPool<S, R>,
        file: FileId,
    ) -> Result<HeapFile<'p, S, R>, HeapFileError> {
        let header_page_no = pool.storage().first_page(file).await?;
        let header_pin = pool.pin_page(PageTag::new(file, header_page_no)).await?;

        let header = {
            let page = header_pin.page().await;
            FileHeader::read_from(page.as_slice())?
        };

        let mut cursor = Cursor::unpositioned();
        cursor
            .reposition(pool, PageTag::new(file, header.first_page))
            .await?;

        Ok(HeapFile {
            pool,
            file,
            header_pin: Some(header_pin),
            header,
            cursor,
        })
    }

    /// The name the file was created under.
    pub fn name(&self) -> &str {
        &self.header.file_name
    }

    /// Number of live records in the file.
    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    /// Number of data pages in the file's chain.
    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    /// Fetches the record identified by `rid`.
    ///
    /// If the record is on the cursor page it is read directly; otherwise
    /// the cursor moves to the record's page (releasing the old pin with
    /// its dirty flag). On success the cursor's current record is `rid`.
    ///
    /// # Errors
    ///
    /// Returns `HeapFileError::SlotNotFound` if `rid` names no live
    /// record; pin failures surface unchanged, leaving the cursor
    /// unpositioned rather than pointing at a page that is not pinned.
    pub async fn record(&mut self, rid: RecordId) -> Result<Vec<u8>, HeapFileError> {
        if self.cursor.page_no() != Some(rid.page_no) {
            self.cursor
                .reposition(self.pool, PageTag::new(self.file, rid.page_no))
                .await?;
        }

        let bytes = {
            let pin = match self.cursor.pin() {
                Some(pin) => pin,
                None => return Err(HeapFileError::NoCurrentRecord),
            };
            let page = pin.page().await;
            DataPage::new(&*page).record(rid.slot_id)?.to_vec()
        };

        self.cursor.set_rid(Some(rid));
        Ok(bytes)
    }

    /// Starts a scan view over this handle.
    pub fn scan(&mut self) -> HeapFileScan<'_, 'p, S, R> {
        HeapFileScan::new(self)
    }

    /// Starts an insert view over this handle.
    pub fn writer(&mut self) -> HeapFileWriter<'_, 'p, S, R> {
        HeapFileWriter::new(self)
    }

    /// Serializes the cached header into the pinned header frame.
    ///
    /// Called after every header mutation; marks the header pin dirty.
    pub(super) async fn flush_header(&mut self) {
        if let Some(pin) = self.header_pin.as_mut() {
            let mut page = pin.page_mut().await;
            self.header.write_to(page.as_mut_slice());
        }
    }
}

impl<S: Storage, R: Replacer> Drop for HeapFile<'_, S, R> {
    fn drop(&mut self) {
        // Teardown order: cursor pin, header pin, file. Each step runs
        // regardless of earlier failures.
        self.cursor.release();
        if let Some(pin) = self.header_pin.take() {
            pin.release();
        }
        if let Err(e) = self.pool.storage().close_file(self.file) {
            eprintln!("heap file {}: close failed: {e}", self.header.file_name);
        }
    }
}
