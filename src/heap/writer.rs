//! Append-only insertion into a heap file.

use crate::buffer::Replacer;
use crate::storage::{PageTag, Storage};

use super::error::HeapFileError;
use super::file::HeapFile;
use super::page::{DataPage, RecordId, MAX_RECORD_SIZE};

/// Insert view over a heap file.
///
/// Insertion always targets the tail of the page chain: no search for free
/// space on earlier pages is made, which keeps insertion O(1) amortized
/// and page growth append-only, at the cost of internal fragmentation from
/// deleted slots on earlier pages.
///
/// Dropping the writer releases the cursor pin.
pub struct HeapFileWriter<'h, 'p, S: Storage, R: Replacer> {
    file: &'h mut HeapFile<'p, S, R>,
}

impl<'h, 'p, S: Storage, R: Replacer> HeapFileWriter<'h, 'p, S, R> {
    pub(super) fn new(file: &'h mut HeapFile<'p, S, R>) -> Self {
        Self { file }
    }

    /// Inserts a record, returning its identifier.
    ///
    /// If the cursor page has no room, the chain is extended: a new page
    /// is allocated and linked behind the current tail, the header's tail
    /// pointer and page count are updated, and the record lands on the new
    /// page. During the linking step two data pages are briefly pinned —
    /// the new tail, then the old tail — and both pins are accounted for
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns `HeapFileError::RecordTooLarge` if the record cannot fit on
    /// any page.
    pub async fn insert(&mut self, record: &[u8]) -> Result<RecordId, HeapFileError> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(HeapFileError::RecordTooLarge {
                size: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let file = &mut *self.file;

        // An unpositioned cursor starts at the tail.
        if file.cursor.pin().is_none() {
            let tag = PageTag::new(file.file, file.header.last_page);
            file.cursor.reposition(file.pool, tag).await?;
        }

        let fits = {
            let pin = match file.cursor.pin() {
                Some(pin) => pin,
                None => return Err(HeapFileError::NoCurrentRecord),
            };
            let guard = pin.page().await;
            DataPage::new(&*guard).can_insert(record.len())
        };

        if !fits {
            // Extend the chain. The cursor page may or may not be the
            // tail; the link is always made from the tail recorded in the
            // header.
            file.cursor.release();

            let mut new_pin = file.pool.alloc_page(file.file).await?;
            let new_page_no = new_pin.page_no();
            {
                let mut guard = new_pin.page_mut().await;
                DataPage::new(&mut *guard).init();
            }

            {
                let old_tail = PageTag::new(file.file, file.header.last_page);
                let mut tail_pin = file.pool.pin_page(old_tail).await?;
                let mut guard = tail_pin.page_mut().await;
                DataPage::new(&mut *guard).set_next_page(Some(new_page_no));
            } // old tail unpinned dirty: its forward link changed

            file.header.last_page = new_page_no;
            file.header.page_count += 1;

            // The new tail, still pinned from allocation, becomes the
            // cursor; the retry below is guaranteed to succeed by the
            // record-size precondition.
            file.cursor.adopt(new_pin);
        }

        let (page_no, slot_id) = {
            let pin = match file.cursor.pin_mut() {
                Some(pin) => pin,
                None => return Err(HeapFileError::NoCurrentRecord),
            };
            let page_no = pin.page_no();
            let mut guard = pin.page_mut().await;
            let slot_id = DataPage::new(&mut *guard).insert(record)?;
            (page_no, slot_id)
        };

        file.header.record_count += 1;
        file.flush_header().await;

        Ok(RecordId::new(page_no, slot_id))
    }
}

impl<S: Storage, R: Replacer> Drop for HeapFileWriter<'_, '_, S, R> {
    fn drop(&mut self) {
        self.file.cursor.release();
    }
}
