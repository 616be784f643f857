//! Buffer pool manager.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::storage::{FileId, PageTag, Storage};

use super::error::BufferError;
use super::frame::{Frame, FrameId, FrameMeta};
use super::pin::PagePin;
use super::replacer::Replacer;

/// Buffer pool: a fixed array of frames caching pages from any number of
/// files, with pin-count protection and pluggable replacement.
///
/// # Locking
///
/// Two kinds of locks exist, acquired in strict order:
///
/// 1. The state mutex (page table, frame metadata, free list, replacer) —
///    synchronous, held only for bookkeeping, **never across I/O**.
/// 2. Per-frame data locks — async, held while reading or writing a
///    frame's bytes.
///
/// The state mutex is never held while waiting on a frame data lock or on
/// storage I/O.
///
/// # Pinning
///
/// [`pin_page`](Self::pin_page) and [`alloc_page`](Self::alloc_page) return
/// a [`PagePin`]; each pin increments the frame's pin count and each
/// dropped (or released) pin decrements it. A frame becomes an eviction
/// candidate only at pin count zero. Dirty information accumulates on the
/// pin and reaches the frame at unpin time.
pub struct BufferPool<S: Storage, R: Replacer> {
    storage: S,
    frames: Vec<Frame>,
    state: Mutex<PoolState<R>>,
    pool_size: usize,
}

struct PoolState<R: Replacer> {
    /// Maps page tags to the frame currently holding them.
    page_table: HashMap<PageTag, FrameId>,

    /// Bookkeeping per frame, indexed by frame id.
    meta: Vec<FrameMeta>,

    /// Frames not currently holding any page.
    free_list: Vec<FrameId>,

    /// Replacement policy over unpinned frames.
    replacer: R,
}

impl<S: Storage, R: Replacer> BufferPool<S, R> {
    /// Creates a buffer pool with `pool_size` frames over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if `pool_size` is 0.
    pub fn new(storage: S, replacer: R, pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<_> = (0..pool_size).map(|_| Frame::new()).collect();
        let meta: Vec<_> = (0..pool_size).map(|_| FrameMeta::new()).collect();
        let free_list: Vec<_> = (0..pool_size).map(FrameId::new).collect();

        Self {
            storage,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                meta,
                free_list,
                replacer,
            }),
            pool_size,
        }
    }

    /// Returns the underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Pins a page, reading it from storage on a miss.
    ///
    /// The page stays resident until the returned [`PagePin`] is dropped.
    /// Repeated pins on the same page stack: each one must be released.
    ///
    /// # Errors
    ///
    /// - `BufferError::NoFreeFrames` if the pool is full of pinned pages
    /// - `BufferError::Storage` if the page does not exist or I/O fails
    pub async fn pin_page(&self, tag: PageTag) -> Result<PagePin<'_, S, R>, BufferError> {
        let frame_id = self.load_frame(tag).await?;
        Ok(PagePin::new(self, tag, frame_id))
    }

    /// Allocates a new page in `file` and pins it.
    ///
    /// The page contents are zeroed.
    pub async fn alloc_page(&self, file: FileId) -> Result<PagePin<'_, S, R>, BufferError> {
        let page_no = self.storage.allocate_page(file).await?;
        self.pin_page(PageTag::new(file, page_no)).await
    }

    /// Writes back all dirty frames belonging to `file`.
    pub async fn flush_file(&self, file: FileId) -> Result<(), BufferError> {
        self.flush_frames(Some(file)).await
    }

    /// Writes back every dirty frame, then syncs storage.
    pub async fn flush_all(&self) -> Result<(), BufferError> {
        self.flush_frames(None).await?;
        self.storage.sync_all().await?;
        Ok(())
    }

    /// Drops all cached frames of `file` without writing them back.
    ///
    /// Used when the file is about to be destroyed: its pages must never
    /// reach storage again.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::PagesPinned` if any frame of the file is
    /// still pinned; nothing is discarded in that case.
    pub fn discard_file(&self, file: FileId) -> Result<(), BufferError> {
        let mut state = self.state.lock();

        let cached: Vec<(PageTag, FrameId)> = state
            .page_table
            .iter()
            .filter(|(tag, _)| tag.file == file)
            .map(|(tag, frame_id)| (*tag, *frame_id))
            .collect();

        if cached
            .iter()
            .any(|(_, frame_id)| state.meta[frame_id.as_usize()].pin_count > 0)
        {
            return Err(BufferError::PagesPinned(file));
        }

        for (tag, frame_id) in cached {
            state.page_table.remove(&tag);
            state.meta[frame_id.as_usize()].clear();
            state.replacer.pin(frame_id);
            state.free_list.push(frame_id);
        }
        Ok(())
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Returns the pin count of a cached page, or `None` on a miss.
    pub fn pin_count(&self, tag: PageTag) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&tag)
            .map(|frame_id| state.meta[frame_id.as_usize()].pin_count)
    }

    pub(super) fn frame_data(&self, frame_id: FrameId) -> &tokio::sync::RwLock<crate::storage::PageData> {
        &self.frames[frame_id.as_usize()].data
    }

    /// Releases one pin on a frame, folding `dirty` into its metadata.
    ///
    /// Synchronous so that [`PagePin`] can unpin from `Drop`. An unpin
    /// without a matching pin indicates a pinning bug; it is reported on
    /// the diagnostic stream and otherwise ignored.
    pub(super) fn unpin_frame(&self, frame_id: FrameId, dirty: bool) {
        let mut state = self.state.lock();

        let meta = &mut state.meta[frame_id.as_usize()];
        if meta.pin_count == 0 {
            eprintln!(
                "buffer pool: unpin without matching pin on frame {}",
                frame_id.as_usize()
            );
            return;
        }

        meta.pin_count -= 1;
        if dirty {
            meta.is_dirty = true;
        }
        let now_evictable = meta.pin_count == 0;

        if now_evictable {
            state.replacer.unpin(frame_id);
        }
    }

    /// Finds or loads the frame for `tag`, incrementing its pin count.
    ///
    /// If multiple tasks race to load the same absent page, each performs
    /// the read; after I/O the page table is re-checked and the redundant
    /// frame is returned to the free list. Wasteful but correct.
    async fn load_frame(&self, tag: PageTag) -> Result<FrameId, BufferError> {
        // Fast path: page already cached.
        {
            let mut state = self.state.lock();
            if let Some(&frame_id) = state.page_table.get(&tag) {
                state.meta[frame_id.as_usize()].pin_count += 1;
                state.replacer.pin(frame_id);
                return Ok(frame_id);
            }
        }

        // Miss: take a frame and read the page into it.
        let frame_id = self.acquire_frame().await?;

        let read_result = {
            let mut data = self.frames[frame_id.as_usize()].data.write().await;
            self.storage
                .read_page(tag.file, tag.page_no, data.as_mut_slice())
                .await
        };
        if let Err(e) = read_result {
            let mut state = self.state.lock();
            state.free_list.push(frame_id);
            return Err(e.into());
        }

        let mut state = self.state.lock();
        if let Some(&existing) = state.page_table.get(&tag) {
            // Another task loaded this page while we were reading.
            state.free_list.push(frame_id);
            state.meta[existing.as_usize()].pin_count += 1;
            state.replacer.pin(existing);
            return Ok(existing);
        }

        state.page_table.insert(tag, frame_id);
        state.meta[frame_id.as_usize()].reset(tag);
        Ok(frame_id)
    }

    /// Takes a free frame, evicting a victim if necessary.
    async fn acquire_frame(&self) -> Result<FrameId, BufferError> {
        {
            let mut state = self.state.lock();
            if let Some(frame_id) = state.free_list.pop() {
                return Ok(frame_id);
            }
        }

        loop {
            let victim = {
                let mut state = self.state.lock();
                state.replacer.victim()
            };
            let frame_id = match victim {
                Some(frame_id) => frame_id,
                None => return Err(BufferError::NoFreeFrames),
            };

            let (old_tag, is_dirty) = {
                let state = self.state.lock();
                let meta = state.meta[frame_id.as_usize()];
                (meta.tag, meta.is_dirty)
            };

            // Write back before releasing the frame.
            if is_dirty {
                if let Some(tag) = old_tag {
                    let data = self.frames[frame_id.as_usize()].data.read().await;
                    self.storage
                        .write_page(tag.file, tag.page_no, data.as_slice())
                        .await?;
                }
            }

            let mut state = self.state.lock();
            if state.meta[frame_id.as_usize()].pin_count > 0 {
                // Re-pinned while we were writing back; pick another victim.
                continue;
            }
            if let Some(tag) = old_tag {
                state.page_table.remove(&tag);
            }
            state.meta[frame_id.as_usize()].clear();
            return Ok(frame_id);
        }
    }

    /// Writes back dirty frames, optionally restricted to one file.
    async fn flush_frames(&self, file: Option<FileId>) -> Result<(), BufferError> {
        let dirty: Vec<(FrameId, PageTag)> = {
            let state = self.state.lock();
            state
                .meta
                .iter()
                .enumerate()
                .filter(|(_, meta)| meta.is_dirty)
                .filter_map(|(i, meta)| meta.tag.map(|tag| (FrameId::new(i), tag)))
                .filter(|(_, tag)| file.map_or(true, |f| tag.file == f))
                .collect()
        };

        for (frame_id, tag) in dirty {
            let data = self.frames[frame_id.as_usize()].data.read().await;

            // The frame may have been evicted and reused since we looked.
            {
                let state = self.state.lock();
                if state.meta[frame_id.as_usize()].tag != Some(tag) {
                    continue;
                }
            }

            self.storage
                .write_page(tag.file, tag.page_no, data.as_slice())
                .await?;

            let mut state = self.state.lock();
            if state.meta[frame_id.as_usize()].tag == Some(tag) {
                state.meta[frame_id.as_usize()].is_dirty = false;
            }
        }
        Ok(())
    }
}
