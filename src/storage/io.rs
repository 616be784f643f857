//! Page I/O backend implementations.
//!
//! This module defines the [`Storage`] trait — the file manager of the
//! system — along with the two backends: [`FileStorage`] for disk-backed
//! operation and [`MemoryStorage`] for tests and ephemeral databases.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::future::Future;

use super::error::StorageError;
use super::page::{FileId, PageNo};

/// File manager and page I/O backend.
///
/// A `Storage` maintains a set of named files, each an array of fixed-size
/// pages, and transfers whole pages between files and caller-owned buffers.
///
/// # Design decisions
///
/// 1. **Async trait**: methods return `Send` futures so the buffer pool can
///    await them from any task. Implementations use `async fn` directly.
/// 2. **Caller-owned buffers**: the backend moves raw bytes only; memory
///    management and caching are the buffer pool's job.
/// 3. **Stable file ids**: a name resolves to the same [`FileId`] across
///    open/close cycles until the file is destroyed, and a destroyed name
///    never reuses its id. The buffer pool relies on this to keep cached
///    frames of a file coherent across reopens and to never serve a stale
///    frame for a recreated name.
/// 4. **Open is reference-counted**: `open_file`/`close_file` pair up;
///    `destroy_file` refuses while any handle is open. Page I/O remains
///    valid for a known id even at zero open handles, so the buffer pool
///    may write back evicted frames of files that have been closed.
pub trait Storage: Send + Sync {
    /// Creates a new empty file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileExists` if the name is taken.
    fn create_file(&self, name: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes a file and its pages.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if the name does not exist and
    /// `StorageError::FileOpen` if any handle to it is still open.
    fn destroy_file(&self, name: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Opens a file, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::FileNotFound` if the name does not exist.
    fn open_file(&self, name: &str) -> impl Future<Output = Result<FileId, StorageError>> + Send;

    /// Closes one handle to a file.
    ///
    /// Synchronous so that owning types can close from `Drop`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnknownFile` if the id was never issued or
    /// the file has no open handles.
    fn close_file(&self, file: FileId) -> Result<(), StorageError>;

    /// Returns the number of the file's first allocated page.
    ///
    /// For heap files this is the header page.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file contains no pages.
    fn first_page(&self, file: FileId)
        -> impl Future<Output = Result<PageNo, StorageError>> + Send;

    /// Reads a page into a caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page is unallocated and
    /// `StorageError::InvalidBufferSize` unless `buf.len() == PAGE_SIZE`.
    fn read_page(
        &self,
        file: FileId,
        page_no: PageNo,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Writes a page from a caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page is unallocated and
    /// `StorageError::InvalidBufferSize` unless `buf.len() == PAGE_SIZE`.
    fn write_page(
        &self,
        file: FileId,
        page_no: PageNo,
        buf: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Appends a zeroed page to the file and returns its number.
    fn allocate_page(
        &self,
        file: FileId,
    ) -> impl Future<Output = Result<PageNo, StorageError>> + Send;

    /// Returns the number of allocated pages in the file.
    fn page_count(&self, file: FileId)
        -> impl Future<Output = Result<u32, StorageError>> + Send;

    /// Syncs all pending writes to durable storage.
    ///
    /// A no-op for in-memory backends.
    fn sync_all(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Generic conformance tests shared by all backends.
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;

    /// Allocates a page in `file` and fills it with `fill`.
    pub async fn allocate_and_fill<S: Storage>(storage: &S, file: FileId, fill: u8) -> PageNo {
        let page_no = storage.allocate_page(file).await.unwrap();
        let buf = vec![fill; PAGE_SIZE];
        storage.write_page(file, page_no, &buf).await.unwrap();
        page_no
    }

    /// Asserts that the page reads back filled with `fill`.
    pub async fn verify_fill<S: Storage>(storage: &S, file: FileId, page_no: PageNo, fill: u8) {
        let mut buf = vec![0u8; PAGE_SIZE];
        storage.read_page(file, page_no, &mut buf).await.unwrap();
        assert!(buf.iter().all(|&b| b == fill));
    }

    pub async fn test_file_lifecycle<S: Storage>(storage: S) {
        // Open before create fails
        assert!(matches!(
            storage.open_file("missing").await,
            Err(StorageError::FileNotFound(_))
        ));

        storage.create_file("alpha").await.unwrap();
        assert!(matches!(
            storage.create_file("alpha").await,
            Err(StorageError::FileExists(_))
        ));

        let file = storage.open_file("alpha").await.unwrap();
        assert_eq!(storage.page_count(file).await.unwrap(), 0);

        // Destroy refuses while open
        assert!(matches!(
            storage.destroy_file("alpha").await,
            Err(StorageError::FileOpen(_))
        ));

        storage.close_file(file).unwrap();
        storage.destroy_file("alpha").await.unwrap();
        assert!(matches!(
            storage.open_file("alpha").await,
            Err(StorageError::FileNotFound(_))
        ));
    }

    pub async fn test_page_roundtrip<S: Storage>(storage: S) {
        storage.create_file("pages").await.unwrap();
        let file = storage.open_file("pages").await.unwrap();

        let p0 = allocate_and_fill(&storage, file, 0x11).await;
        let p1 = allocate_and_fill(&storage, file, 0x22).await;

        assert_eq!(p0, PageNo::new(0));
        assert_eq!(p1, PageNo::new(1));
        assert_eq!(storage.page_count(file).await.unwrap(), 2);
        assert_eq!(storage.first_page(file).await.unwrap(), PageNo::new(0));

        verify_fill(&storage, file, p0, 0x11).await;
        verify_fill(&storage, file, p1, 0x22).await;

        storage.close_file(file).unwrap();
    }

    pub async fn test_stable_file_id<S: Storage>(storage: S) {
        storage.create_file("stable").await.unwrap();

        let first = storage.open_file("stable").await.unwrap();
        storage.close_file(first).unwrap();

        // Reopen resolves to the same id
        let second = storage.open_file("stable").await.unwrap();
        assert_eq!(first, second);
        storage.close_file(second).unwrap();

        // A recreated name gets a fresh id
        storage.destroy_file("stable").await.unwrap();
        storage.create_file("stable").await.unwrap();
        let third = storage.open_file("stable").await.unwrap();
        assert_ne!(first, third);
        storage.close_file(third).unwrap();
    }

    pub async fn test_page_not_found<S: Storage>(storage: S) {
        storage.create_file("empty").await.unwrap();
        let file = storage.open_file("empty").await.unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            storage.read_page(file, PageNo::new(0), &mut buf).await,
            Err(StorageError::PageNotFound { .. })
        ));
        assert!(matches!(
            storage.first_page(file).await,
            Err(StorageError::Corrupted(_))
        ));

        storage.close_file(file).unwrap();
    }

    pub async fn test_buffer_size_validation<S: Storage>(storage: S) {
        storage.create_file("sized").await.unwrap();
        let file = storage.open_file("sized").await.unwrap();
        let page_no = storage.allocate_page(file).await.unwrap();

        let mut small = vec![0u8; 100];
        assert!(matches!(
            storage.read_page(file, page_no, &mut small).await,
            Err(StorageError::InvalidBufferSize { .. })
        ));
        assert!(matches!(
            storage.write_page(file, page_no, &small).await,
            Err(StorageError::InvalidBufferSize { .. })
        ));

        storage.close_file(file).unwrap();
    }

    pub async fn test_io_after_close<S: Storage>(storage: S) {
        // The buffer pool may evict dirty frames of a file that has been
        // closed; page I/O must keep working for a known id.
        storage.create_file("lagging").await.unwrap();
        let file = storage.open_file("lagging").await.unwrap();
        let page_no = allocate_and_fill(&storage, file, 0x33).await;
        storage.close_file(file).unwrap();

        let buf = vec![0x44u8; PAGE_SIZE];
        storage.write_page(file, page_no, &buf).await.unwrap();
        verify_fill(&storage, file, page_no, 0x44).await;
    }
}
