//! haystack — disk-backed heap-file record storage.
//!
//! A heap file presents an on-disk file of pages as an unordered collection
//! of variable-length records. Records are addressed by stable identifiers,
//! inserted append-only at the tail of a singly-linked page chain, and read
//! back either by identifier or through filtered sequential scans.
//!
//! # Architecture
//!
//! ```text
//! +----------------------------------+
//! | heap                             |  HeapFile handle, scan + insert
//! | (header page, cursor, records)   |  views, slotted data pages
//! +----------------------------------+
//!                 |
//!                 v
//! +----------------------------------+
//! | buffer                           |  BufferPool: frames, pin counts,
//! | (pin/unpin, eviction, dirty)     |  LRU replacement, write-back
//! +----------------------------------+
//!                 |
//!                 v
//! +----------------------------------+
//! | storage                          |  Storage trait: named files of
//! | (FileStorage / MemoryStorage)    |  8KB pages, page-granular I/O
//! +----------------------------------+
//! ```

pub mod buffer;
pub mod heap;
pub mod storage;
