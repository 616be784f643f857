//! Disk-backed storage implementation.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{FileId, PageNo, PAGE_SIZE};

/// Disk-backed storage: a directory holding one raw page-array file per name.
///
/// # File layout
///
/// ```text
/// <root>/<name>:
/// +------------------+------------------+------------------+
/// | Page 0 (8KB)     | Page 1 (8KB)     | Page 2 (8KB)     | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset 8192      ^ offset 16384
/// ```
///
/// # Concurrency
///
/// The name/id registry is guarded by a synchronous mutex, never held
/// across I/O. Each file's handle sits behind its own `tokio::Mutex`, so
/// I/O to distinct files proceeds in parallel while I/O to one file is
/// serialized.
///
/// # Id stability
///
/// Once a name has been opened its [`FileId`] stays registered — and its
/// OS handle stays usable — until the file is destroyed, even while the
/// open count is zero. Late write-back from the buffer pool relies on this.
pub struct FileStorage {
    root: PathBuf,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    next_file_id: u64,
    by_name: HashMap<String, FileId>,
    files: HashMap<FileId, FileEntry>,
}

struct FileEntry {
    name: String,
    open_count: u32,
    handle: Arc<FileHandle>,
}

struct FileHandle {
    file: tokio::sync::Mutex<TokioFile>,
    pages: AtomicU32,
}

impl FileStorage {
    /// Opens (creating if necessary) a storage directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            registry: Mutex::new(Registry::default()),
        })
    }

    /// Returns the storage directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn handle_of(&self, file: FileId) -> Result<Arc<FileHandle>, StorageError> {
        let registry = self.registry.lock();
        registry
            .files
            .get(&file)
            .map(|entry| Arc::clone(&entry.handle))
            .ok_or(StorageError::UnknownFile(file))
    }

    /// Opens the OS file and derives its page count from the file size.
    async fn open_os_file(&self, name: &str) -> Result<(TokioFile, u32), StorageError> {
        let path = self.path_of(name);
        let file = match OpenOptions::new().read(true).write(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file_size = file.metadata().await?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file {} has size {} which is not a multiple of the page size {}",
                name, file_size, PAGE_SIZE
            )));
        }

        Ok((file, (file_size / PAGE_SIZE as u64) as u32))
    }
}

impl Storage for FileStorage {
    async fn create_file(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::FileExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn destroy_file(&self, name: &str) -> Result<(), StorageError> {
        {
            let mut registry = self.registry.lock();
            if let Some(&id) = registry.by_name.get(name) {
                let open_count = registry
                    .files
                    .get(&id)
                    .map(|entry| entry.open_count)
                    .unwrap_or(0);
                if open_count > 0 {
                    return Err(StorageError::FileOpen(name.to_string()));
                }
                registry.by_name.remove(name);
                registry.files.remove(&id);
            }
        }

        match tokio::fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn open_file(&self, name: &str) -> Result<FileId, StorageError> {
        // Fast path: the name is already registered.
        {
            let mut registry = self.registry.lock();
            if let Some(&id) = registry.by_name.get(name) {
                if let Some(entry) = registry.files.get_mut(&id) {
                    entry.open_count += 1;
                    return Ok(id);
                }
            }
        }

        // Miss: open the OS file, then register under the lock. Another
        // task may have registered the same name while we were doing I/O;
        // in that case use its entry and discard our handle.
        let (file, pages) = self.open_os_file(name).await?;

        let mut registry = self.registry.lock();
        if let Some(&id) = registry.by_name.get(name) {
            if let Some(entry) = registry.files.get_mut(&id) {
                entry.open_count += 1;
                return Ok(id);
            }
        }

        let id = FileId::new(registry.next_file_id);
        registry.next_file_id += 1;
        registry.by_name.insert(name.to_string(), id);
        registry.files.insert(
            id,
            FileEntry {
                name: name.to_string(),
                open_count: 1,
                handle: Arc::new(FileHandle {
                    file: tokio::sync::Mutex::new(file),
                    pages: AtomicU32::new(pages),
                }),
            },
        );
        Ok(id)
    }

    fn close_file(&self, file: FileId) -> Result<(), StorageError> {
        let mut registry = self.registry.lock();
        let entry = registry
            .files
            .get_mut(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        if entry.open_count == 0 {
            return Err(StorageError::UnknownFile(file));
        }
        entry.open_count -= 1;
        Ok(())
    }

    async fn first_page(&self, file: FileId) -> Result<PageNo, StorageError> {
        let handle = self.handle_of(file)?;
        if handle.pages.load(Ordering::Acquire) == 0 {
            let name = self
                .registry
                .lock()
                .files
                .get(&file)
                .map(|entry| entry.name.clone())
                .unwrap_or_default();
            return Err(StorageError::Corrupted(format!(
                "file {name} contains no pages"
            )));
        }
        Ok(PageNo::new(0))
    }

    async fn read_page(
        &self,
        file: FileId,
        page_no: PageNo,
        buf: &mut [u8],
    ) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let handle = self.handle_of(file)?;
        if page_no.page_num() >= handle.pages.load(Ordering::Acquire) {
            return Err(StorageError::PageNotFound { file, page_no });
        }

        let mut os_file = handle.file.lock().await;
        os_file.seek(SeekFrom::Start(page_no.byte_offset())).await?;
        os_file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_page(
        &self,
        file: FileId,
        page_no: PageNo,
        buf: &[u8],
    ) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }

        let handle = self.handle_of(file)?;
        if page_no.page_num() >= handle.pages.load(Ordering::Acquire) {
            return Err(StorageError::PageNotFound { file, page_no });
        }

        let mut os_file = handle.file.lock().await;
        os_file.seek(SeekFrom::Start(page_no.byte_offset())).await?;
        os_file.write_all(buf).await?;
        Ok(())
    }

    async fn allocate_page(&self, file: FileId) -> Result<PageNo, StorageError> {
        let handle = self.handle_of(file)?;

        // The file mutex serializes concurrent allocations on one file.
        let mut os_file = handle.file.lock().await;
        let page_num = handle.pages.load(Ordering::Acquire);
        let page_no = PageNo::new(page_num);

        os_file.seek(SeekFrom::Start(page_no.byte_offset())).await?;
        os_file.write_all(&[0u8; PAGE_SIZE]).await?;

        handle.pages.store(page_num + 1, Ordering::Release);
        Ok(page_no)
    }

    async fn page_count(&self, file: FileId) -> Result<u32, StorageError> {
        let handle = self.handle_of(file)?;
        Ok(handle.pages.load(Ordering::Acquire))
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        let handles: Vec<Arc<FileHandle>> = {
            let registry = self.registry.lock();
            registry
                .files
                .values()
                .map(|entry| Arc::clone(&entry.handle))
                .collect()
        };

        for handle in handles {
            let os_file = handle.file.lock().await;
            os_file.sync_all().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests as generic;
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_lifecycle() {
        let dir = tempdir().unwrap();
        generic::test_file_lifecycle(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_page_roundtrip() {
        let dir = tempdir().unwrap();
        generic::test_page_roundtrip(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_stable_file_id() {
        let dir = tempdir().unwrap();
        generic::test_stable_file_id(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_page_not_found() {
        let dir = tempdir().unwrap();
        generic::test_page_not_found(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_buffer_size_validation() {
        let dir = tempdir().unwrap();
        generic::test_buffer_size_validation(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_io_after_close() {
        let dir = tempdir().unwrap();
        generic::test_io_after_close(FileStorage::open(dir.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_corrupted_file_size() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        tokio::fs::write(dir.path().join("ragged"), vec![0u8; 100])
            .await
            .unwrap();
        assert!(matches!(
            storage.open_file("ragged").await,
            Err(StorageError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let dir = tempdir().unwrap();
        let mut page_nos = Vec::new();

        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            storage.create_file("durable").await.unwrap();
            let file = storage.open_file("durable").await.unwrap();
            for i in 0..5u8 {
                page_nos.push(generic::allocate_and_fill(&storage, file, i * 10).await);
            }
            storage.sync_all().await.unwrap();
            storage.close_file(file).unwrap();
        }

        {
            let storage = FileStorage::open(dir.path()).await.unwrap();
            let file = storage.open_file("durable").await.unwrap();
            assert_eq!(storage.page_count(file).await.unwrap(), 5);
            for (i, &page_no) in page_nos.iter().enumerate() {
                generic::verify_fill(&storage, file, page_no, (i as u8) * 10).await;
            }
            storage.close_file(file).unwrap();
        }
    }
}
