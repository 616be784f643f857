//! Filtered forward scan over a heap file.

use crate::buffer::Replacer;
use crate::storage::{PageNo, PageTag, Storage};

use super::error::HeapFileError;
use super::file::HeapFile;
use super::page::{DataPage, RecordId};
use super::predicate::Predicate;

/// Snapshot of a scan position taken by [`HeapFileScan::mark`].
#[derive(Debug, Clone, Copy)]
struct ScanMark {
    page_no: Option<PageNo>,
    rid: Option<RecordId>,
}

/// Forward-only, resumable scan over a heap file's page chain.
///
/// The scan borrows the handle exclusively and drives its cursor: between
/// [`next`](Self::next) calls the current page stays pinned, so the
/// caller observes a stable position until the scan advances. An optional
/// [`Predicate`] filters the records yielded.
///
/// Dropping the scan releases the cursor pin (equivalent to
/// [`end`](Self::end)).
pub struct HeapFileScan<'h, 'p, S: Storage, R: Replacer> {
    file: &'h mut HeapFile<'p, S, R>,
    predicate: Option<Predicate>,
    mark: Option<ScanMark>,
    exhausted: bool,
}

impl<'h, 'p, S: Storage, R: Replacer> HeapFileScan<'h, 'p, S, R> {
    pub(super) fn new(file: &'h mut HeapFile<'p, S, R>) -> Self {
        Self {
            file,
            predicate: None,
            mark: None,
            exhausted: false,
        }
    }

    /// Installs a filter; subsequent [`next`](Self::next) calls yield only
    /// matching records. Replaces any previous filter without moving the
    /// scan position.
    pub fn set_filter(&mut self, predicate: Predicate) {
        self.predicate = Some(predicate);
    }

    /// Removes the filter; the scan yields every record.
    pub fn clear_filter(&mut self) {
        self.predicate = None;
    }

    /// Advances to the next record satisfying the filter.
    ///
    /// Returns `Ok(None)` when the chain is exhausted; after that the scan
    /// stays exhausted until [`reset`](Self::reset) restores a marked
    /// position. Records are yielded in chain order, and within a page in
    /// slot order.
    pub async fn next(&mut self) -> Result<Option<RecordId>, HeapFileError> {
        if self.exhausted {
            return Ok(None);
        }

        // An unpositioned cursor starts at the head of the chain.
        if self.file.cursor.pin().is_none() {
            let tag = PageTag::new(self.file.file, self.file.header.first_page);
            self.file.cursor.reposition(self.file.pool, tag).await?;
        }

        loop {
            let (matched, next_page, page_no) = {
                let pin = match self.file.cursor.pin() {
                    Some(pin) => pin,
                    None => return Err(HeapFileError::NoCurrentRecord),
                };
                let page_no = pin.page_no();
                let guard = pin.page().await;
                let page = DataPage::new(&*guard);

                let mut candidate = match self.file.cursor.rid() {
                    Some(rid) => page.next_slot(rid.slot_id),
                    None => page.first_slot(),
                };

                let mut matched = None;
                while let Some(slot_id) = candidate {
                    if let Some(record) = page.read(slot_id) {
                        let satisfied = match &self.predicate {
                            Some(predicate) => predicate.matches(record),
                            None => true,
                        };
                        if satisfied {
                            matched = Some(slot_id);
                            break;
                        }
                    }
                    candidate = page.next_slot(slot_id);
                }

                (matched, page.next_page(), page_no)
            };

            if let Some(slot_id) = matched {
                let rid = RecordId::new(page_no, slot_id);
                self.file.cursor.set_rid(Some(rid));
                return Ok(Some(rid));
            }

            // End of page. Check the chain link before touching the pool:
            // the sentinel must never be pinned.
            match next_page {
                Some(next) => {
                    let tag = PageTag::new(self.file.file, next);
                    self.file.cursor.reposition(self.file.pool, tag).await?;
                }
                None => {
                    self.file.cursor.set_rid(None);
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Returns the bytes of the current record. The page stays pinned.
    ///
    /// # Errors
    ///
    /// Returns `HeapFileError::NoCurrentRecord` if the scan has not
    /// yielded a record (or the position was cleared).
    pub async fn record(&self) -> Result<Vec<u8>, HeapFileError> {
        let rid = self
            .file
            .cursor
            .rid()
            .ok_or(HeapFileError::NoCurrentRecord)?;
        let pin = self
            .file
            .cursor
            .pin()
            .ok_or(HeapFileError::NoCurrentRecord)?;

        let guard = pin.page().await;
        Ok(DataPage::new(&*guard).record(rid.slot_id)?.to_vec())
    }

    /// Deletes the current record.
    ///
    /// The cursor page is marked dirty and the file's record count drops
    /// by one. The scan position is kept: advancing afterwards is
    /// well-defined because slot iteration works on slot numbers, not
    /// record identity.
    pub async fn delete_current(&mut self) -> Result<(), HeapFileError> {
        let rid = self
            .file
            .cursor
            .rid()
            .ok_or(HeapFileError::NoCurrentRecord)?;

        {
            let pin = self
                .file
                .cursor
                .pin_mut()
                .ok_or(HeapFileError::NoCurrentRecord)?;
            let mut guard = pin.page_mut().await;
            DataPage::new(&mut *guard).delete(rid.slot_id)?;
        }

        self.file.header.record_count -= 1;
        self.file.flush_header().await;
        Ok(())
    }

    /// Marks the cursor page dirty.
    ///
    /// For callers that mutated record bytes through
    /// [`record`](Self::record)-independent means.
    pub fn mark_dirty(&mut self) {
        self.file.cursor.mark_dirty();
    }

    /// Snapshots the scan position for a later [`reset`](Self::reset).
    pub fn mark(&mut self) {
        self.mark = Some(ScanMark {
            page_no: self.file.cursor.page_no(),
            rid: self.file.cursor.rid(),
        });
    }

    /// Restores the most recently marked position.
    ///
    /// If the mark is on another page the cursor moves there, arriving
    /// with a clean dirty tag — modifications released through the
    /// intervening unpin are already in the pool's custody, but a caller
    /// that kept mutating must mark dirty again after the reset. Without a
    /// prior [`mark`](Self::mark) this is a no-op.
    pub async fn reset(&mut self) -> Result<(), HeapFileError> {
        let Some(mark) = self.mark else {
            return Ok(());
        };

        if self.file.cursor.page_no() != mark.page_no {
            match mark.page_no {
                Some(page_no) => {
                    let tag = PageTag::new(self.file.file, page_no);
                    self.file.cursor.reposition(self.file.pool, tag).await?;
                }
                None => self.file.cursor.release(),
            }
        }
        self.file.cursor.set_rid(mark.rid);
        self.exhausted = false;
        Ok(())
    }

    /// Ends the scan, releasing the cursor pin. Idempotent.
    pub fn end(&mut self) {
        self.file.cursor.release();
    }
}

impl<S: Storage, R: Replacer> Drop for HeapFileScan<'_, '_, S, R> {
    fn drop(&mut self) {
        self.end();
    }
}
