//! Buffer pool for caching file pages in memory.
//!
//! The buffer pool sits between the storage layer and the heap-file layer,
//! caching frequently accessed pages in a fixed set of frames. Pages are
//! addressed by [`PageTag`](crate::storage::PageTag) (file + page number),
//! so one pool serves any number of files.
//!
//! Pinning is the only coordination mechanism exposed upward: a pinned
//! frame is guaranteed resident, and a frame becomes eligible for eviction
//! only when its last pin is released. [`PagePin`] is the unit of pinning —
//! it accumulates a dirty flag from writes and releases its pin on drop,
//! so every pin has a matching unpin on every exit path.

pub mod error;
pub mod frame;
pub mod pin;
pub mod pool;
pub mod replacer;

pub use error::BufferError;
pub use frame::FrameId;
pub use pin::PagePin;
pub use pool::BufferPool;
pub use replacer::{LruReplacer, Replacer};
