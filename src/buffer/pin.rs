//! Scoped pin guard for buffer pool pages.

use tokio::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::storage::{FileId, PageData, PageNo, PageTag, Storage};

use super::frame::FrameId;
use super::pool::BufferPool;
use super::replacer::Replacer;

/// A held pin on one buffer frame.
///
/// While a `PagePin` exists its page is guaranteed resident. The pin is
/// released when the guard is dropped (or explicitly [`release`]d), with
/// the dirty flag the guard accumulated: any [`page_mut`] access or
/// [`mark_dirty`] call promotes the eventual unpin to dirty, so writes are
/// never lost to an unmarked release.
///
/// The guard holds only the pin, not a data lock — page bytes are accessed
/// through short-lived [`page`]/[`page_mut`] borrows. This lets a pin be
/// held across calls (a scan cursor, a cached header page) without
/// blocking other frames or the pool.
///
/// [`release`]: Self::release
/// [`page`]: Self::page
/// [`page_mut`]: Self::page_mut
/// [`mark_dirty`]: Self::mark_dirty
pub struct PagePin<'a, S: Storage, R: Replacer> {
    pool: &'a BufferPool<S, R>,
    tag: PageTag,
    frame_id: FrameId,
    dirty: bool,
}

impl<'a, S: Storage, R: Replacer> PagePin<'a, S, R> {
    pub(super) fn new(pool: &'a BufferPool<S, R>, tag: PageTag, frame_id: FrameId) -> Self {
        Self {
            pool,
            tag,
            frame_id,
            dirty: false,
        }
    }

    /// The pinned page's address.
    pub fn tag(&self) -> PageTag {
        self.tag
    }

    /// The pinned page's number within its file.
    pub fn page_no(&self) -> PageNo {
        self.tag.page_no
    }

    /// The file the pinned page belongs to.
    pub fn file(&self) -> FileId {
        self.tag.file
    }

    /// Whether this pin will release as dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces the eventual unpin to mark the frame dirty.
    ///
    /// For callers that mutate page bytes through a borrow they obtained
    /// earlier and have since dropped.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Borrows the page bytes for reading.
    pub async fn page(&self) -> RwLockReadGuard<'_, PageData> {
        self.pool.frame_data(self.frame_id).read().await
    }

    /// Borrows the page bytes for writing.
    ///
    /// Conservatively marks the pin dirty: any write access promotes the
    /// page to dirty at unpin time.
    pub async fn page_mut(&mut self) -> RwLockWriteGuard<'_, PageData> {
        self.dirty = true;
        self.pool.frame_data(self.frame_id).write().await
    }

    /// Releases the pin, unpinning with the accumulated dirty flag.
    ///
    /// Equivalent to dropping the guard; written out at call sites where
    /// the release is the point.
    pub fn release(self) {}
}

impl<S: Storage, R: Replacer> Drop for PagePin<'_, S, R> {
    fn drop(&mut self) {
        self.pool.unpin_frame(self.frame_id, self.dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::replacer::LruReplacer;
    use crate::storage::MemoryStorage;

    async fn pool_with_file() -> (BufferPool<MemoryStorage, LruReplacer>, FileId) {
        let storage = MemoryStorage::new();
        storage.create_file("pin_test").await.unwrap();
        let file = storage.open_file("pin_test").await.unwrap();
        let pool = BufferPool::new(storage, LruReplacer::new(), 4);
        (pool, file)
    }

    #[tokio::test]
    async fn test_drop_releases_pin() {
        let (pool, file) = pool_with_file().await;

        let pin = pool.alloc_page(file).await.unwrap();
        let tag = pin.tag();
        assert_eq!(pool.pin_count(tag), Some(1));

        drop(pin);
        assert_eq!(pool.pin_count(tag), Some(0));
    }

    #[tokio::test]
    async fn test_release_is_drop() {
        let (pool, file) = pool_with_file().await;

        let pin = pool.alloc_page(file).await.unwrap();
        let tag = pin.tag();
        pin.release();
        assert_eq!(pool.pin_count(tag), Some(0));
    }

    #[tokio::test]
    async fn test_page_mut_marks_dirty() {
        let (pool, file) = pool_with_file().await;

        let mut pin = pool.alloc_page(file).await.unwrap();
        assert!(!pin.is_dirty());

        let _ = pin.page_mut().await;
        assert!(pin.is_dirty());
    }

    #[tokio::test]
    async fn test_read_access_stays_clean() {
        let (pool, file) = pool_with_file().await;

        let mut pin = pool.alloc_page(file).await.unwrap();
        let _ = pin.page().await;
        assert!(!pin.is_dirty());

        pin.mark_dirty();
        assert!(pin.is_dirty());
    }
}
