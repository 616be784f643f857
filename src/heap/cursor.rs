//! The handle's data-page cursor.
//!
//! A [`Cursor`] owns the at-most-one data-page pin a heap file handle may
//! hold, together with the identifier of the most recently accessed record
//! on that page. Both the scan and insert views move through the file by
//! mutating this one object, so the pin discipline — release the old page
//! before adopting a new one, fold the accumulated dirty flag into every
//! release — lives in one place.

use crate::buffer::{BufferPool, PagePin, Replacer};
use crate::storage::{PageNo, PageTag, Storage};

use super::error::HeapFileError;
use super::page::RecordId;

/// At-most-one pinned data page plus the current record position.
pub(super) struct Cursor<'p, S: Storage, R: Replacer> {
    pin: Option<PagePin<'p, S, R>>,
    rid: Option<RecordId>,
}

impl<'p, S: Storage, R: Replacer> Cursor<'p, S, R> {
    /// Creates a cursor with no pinned page.
    pub(super) fn unpositioned() -> Self {
        Self {
            pin: None,
            rid: None,
        }
    }

    /// The pinned page's number, if any page is pinned.
    pub(super) fn page_no(&self) -> Option<PageNo> {
        self.pin.as_ref().map(|pin| pin.page_no())
    }

    /// The currently pinned page.
    pub(super) fn pin(&self) -> Option<&PagePin<'p, S, R>> {
        self.pin.as_ref()
    }

    /// The currently pinned page, mutably.
    pub(super) fn pin_mut(&mut self) -> Option<&mut PagePin<'p, S, R>> {
        self.pin.as_mut()
    }

    /// The most recently accessed record on the pinned page.
    pub(super) fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Records the current position.
    pub(super) fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Moves the cursor to `tag`: releases the old pin (with whatever
    /// dirty flag it accumulated), pins the new page, and clears the
    /// record position. The new pin starts clean.
    pub(super) async fn reposition(
        &mut self,
        pool: &'p BufferPool<S, R>,
        tag: PageTag,
    ) -> Result<(), HeapFileError> {
        self.release();
        self.pin = Some(pool.pin_page(tag).await?);
        Ok(())
    }

    /// Adopts an already-pinned page as the cursor, releasing any old pin
    /// first. Used when insertion extends the chain: the freshly allocated
    /// tail arrives pinned and becomes the cursor directly.
    pub(super) fn adopt(&mut self, pin: PagePin<'p, S, R>) {
        self.release();
        self.pin = Some(pin);
    }

    /// Releases the pinned page, if any, and clears the position.
    /// Idempotent.
    pub(super) fn release(&mut self) {
        if let Some(pin) = self.pin.take() {
            pin.release();
        }
        self.rid = None;
    }

    /// Marks the pinned page dirty. No-op when nothing is pinned.
    pub(super) fn mark_dirty(&mut self) {
        if let Some(pin) = self.pin.as_mut() {
            pin.mark_dirty();
        }
    }
}
