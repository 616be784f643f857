//! Error types for the heap-file layer.

use std::fmt;

use crate::buffer::BufferError;
use crate::storage::StorageError;

use super::page::SlotId;

/// Errors from heap-file operations.
#[derive(Debug)]
pub enum HeapFileError {
    /// `create` on a name that already has a file.
    FileExists(String),

    /// Invalid scan filter configuration.
    InvalidScanParam(&'static str),

    /// Record larger than any page can hold.
    RecordTooLarge {
        /// Record size in bytes.
        size: usize,
        /// Largest insertable record size.
        max: usize,
    },

    /// Page is full, cannot insert.
    ///
    /// Handled internally by insertion (triggers page allocation); surfaces
    /// only through direct [`DataPage`](super::DataPage) use.
    PageFull {
        /// Bytes required for the record and its slot.
        required: usize,
        /// Bytes available in free space.
        available: usize,
    },

    /// Slot not found or already deleted.
    SlotNotFound(SlotId),

    /// Operation needs a positioned record but the scan has none.
    NoCurrentRecord,

    /// The file's header page failed validation.
    Corrupted(String),

    /// Buffer pool error.
    Buffer(BufferError),

    /// Storage error from file lifecycle operations.
    Storage(StorageError),
}

impl fmt::Display for HeapFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapFileError::FileExists(name) => write!(f, "heap file already exists: {name}"),
            HeapFileError::InvalidScanParam(reason) => {
                write!(f, "invalid scan parameter: {reason}")
            }
            HeapFileError::RecordTooLarge { size, max } => {
                write!(f, "record of {size} bytes exceeds the {max}-byte page limit")
            }
            HeapFileError::PageFull {
                required,
                available,
            } => {
                write!(f, "page full: need {required} bytes, have {available}")
            }
            HeapFileError::SlotNotFound(slot_id) => {
                write!(f, "slot {slot_id} not found or deleted")
            }
            HeapFileError::NoCurrentRecord => write!(f, "scan has no current record"),
            HeapFileError::Corrupted(msg) => write!(f, "heap file corrupted: {msg}"),
            HeapFileError::Buffer(e) => write!(f, "buffer pool error: {e}"),
            HeapFileError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for HeapFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapFileError::Buffer(e) => Some(e),
            HeapFileError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BufferError> for HeapFileError {
    fn from(e: BufferError) -> Self {
        HeapFileError::Buffer(e)
    }
}

impl From<StorageError> for HeapFileError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::FileExists(name) => HeapFileError::FileExists(name),
            other => HeapFileError::Storage(other),
        }
    }
}
