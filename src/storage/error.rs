//! Storage layer errors.

use crate::storage::page::{FileId, PageNo};

/// Errors surfaced by storage backends.
#[derive(Debug)]
pub enum StorageError {
    /// `create_file` on a name that already exists.
    FileExists(String),

    /// `open_file` or `destroy_file` on a name that does not exist.
    FileNotFound(String),

    /// `destroy_file` on a file that still has open handles.
    FileOpen(String),

    /// Page I/O through a file id the backend does not know.
    ///
    /// Either the id was never issued by this backend or the file has
    /// since been destroyed.
    UnknownFile(FileId),

    /// Read or write of a page number beyond the file's allocated range.
    PageNotFound { file: FileId, page_no: PageNo },

    /// Buffer passed to `read_page`/`write_page` is not exactly one page.
    InvalidBufferSize { expected: usize, actual: usize },

    /// I/O error from the underlying file system.
    Io(std::io::Error),

    /// The on-disk file has an invalid shape (e.g. its size is not a
    /// multiple of the page size, or it contains no pages at all).
    Corrupted(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileExists(name) => write!(f, "file already exists: {name}"),
            StorageError::FileNotFound(name) => write!(f, "file not found: {name}"),
            StorageError::FileOpen(name) => write!(f, "file is open: {name}"),
            StorageError::UnknownFile(file) => {
                write!(f, "unknown file id: {}", file.as_u64())
            }
            StorageError::PageNotFound { file, page_no } => {
                write!(
                    f,
                    "page {} not found in file {}",
                    page_no.page_num(),
                    file.as_u64()
                )
            }
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(f, "invalid buffer size: expected {expected}, got {actual}")
            }
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Corrupted(msg) => write!(f, "storage corrupted: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
