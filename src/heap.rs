//! Heap files: unordered collections of variable-length records.
//!
//! A heap file is a named file whose first page is a header (name, chain
//! head/tail, page and record counts) followed by a singly-linked chain of
//! slotted data pages. Records are addressed by [`RecordId`] — a page
//! number plus a slot number — which stays valid until the record is
//! deleted.
//!
//! - [`create`] / [`destroy`]: file lifecycle
//! - [`HeapFile`]: open handle; pins the header page for its lifetime and
//!   keeps at most one data page pinned as a cursor
//! - [`HeapFileScan`]: filtered forward scan with mark/reset and in-place
//!   delete, obtained from [`HeapFile::scan`]
//! - [`HeapFileWriter`]: append-only insertion, obtained from
//!   [`HeapFile::writer`]
//! - [`DataPage`]: the slotted page layout with a forward chain link
//! - [`Predicate`]: typed byte-range filter applied during scans

mod cursor;
mod error;
mod file;
mod header;
mod page;
mod predicate;
mod scan;
mod writer;

pub use error::HeapFileError;
pub use file::{create, destroy, HeapFile};
pub use header::FileHeader;
pub use page::{DataPage, RecordId, SlotId, DATA_PAGE_HEADER_SIZE, MAX_RECORD_SIZE, SLOT_SIZE};
pub use predicate::{AttrType, CompareOp, Predicate};
pub use scan::HeapFileScan;
pub use writer::HeapFileWriter;
