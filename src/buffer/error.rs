//! Buffer pool errors.

use crate::storage::{FileId, StorageError};

/// Errors that can occur during buffer pool operations.
#[derive(Debug)]
pub enum BufferError {
    /// The pool is full and every frame is pinned.
    NoFreeFrames,

    /// `discard_file` found frames of the file still pinned.
    PagesPinned(FileId),

    /// Underlying storage error.
    Storage(StorageError),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::NoFreeFrames => {
                write!(f, "no free frames available and all pages are pinned")
            }
            BufferError::PagesPinned(file) => {
                write!(f, "file {} still has pinned pages", file.as_u64())
            }
            BufferError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BufferError {
    fn from(e: StorageError) -> Self {
        BufferError::Storage(e)
    }
}
