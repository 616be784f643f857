//! In-memory storage implementation.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{FileId, PageData, PageNo, PAGE_SIZE};

/// In-memory storage for tests and ephemeral databases.
///
/// Files live in a registry under a single synchronous lock; every
/// operation copies whole pages while holding it briefly. File-id
/// semantics match [`FileStorage`](super::FileStorage): a name keeps its
/// id until destroyed, and destroyed ids are never reissued.
pub struct MemoryStorage {
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    next_file_id: u64,
    by_name: HashMap<String, FileId>,
    files: HashMap<FileId, MemFile>,
}

struct MemFile {
    open_count: u32,
    pages: Vec<PageData>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    async fn create_file(&self, name: &str) -> Result<(), StorageError> {
        let mut registry = self.registry.lock();
        if registry.by_name.contains_key(name) {
            return Err(StorageError::FileExists(name.to_string()));
        }
        let id = FileId::new(registry.next_file_id);
        registry.next_file_id += 1;
        registry.by_name.insert(name.to_string(), id);
        registry.files.insert(
            id,
            MemFile {
                open_count: 0,
                pages: Vec::new(),
            },
        );
        Ok(())
    }

    async fn destroy_file(&self, name: &str) -> Result<(), StorageError> {
        let mut registry = self.registry.lock();
        let id = *registry
            .by_name
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        let open_count = registry.files.get(&id).map(|f| f.open_count).unwrap_or(0);
        if open_count > 0 {
            return Err(StorageError::FileOpen(name.to_string()));
        }
        registry.by_name.remove(name);
        registry.files.remove(&id);
        Ok(())
    }

    async fn open_file(&self, name: &str) -> Result<FileId, StorageError> {
        let mut registry = self.registry.lock();
        let id = *registry
            .by_name
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        registry
            .files
            .get_mut(&id)
            .expect("registered name maps to a file")
            .open_count += 1;
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
        let registry = self.registry.lock();
        let entry = registry
            .files
            .get(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        if entry.pages.is_empty() {
            return Err(StorageError::Corrupted("file contains no pages".to_string()));
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

        let registry = self.registry.lock();
        let entry = registry
            .files
            .get(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        let page = entry
            .pages
            .get(page_no.page_num() as usize)
            .ok_or(StorageError::PageNotFound { file, page_no })?;
        buf.copy_from_slice(page.as_slice());
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

        let mut registry = self.registry.lock();
        let entry = registry
            .files
            .get_mut(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        let page = entry
            .pages
            .get_mut(page_no.page_num() as usize)
            .ok_or(StorageError::PageNotFound { file, page_no })?;
        page.as_mut_slice().copy_from_slice(buf);
        Ok(())
    }

    async fn allocate_page(&self, file: FileId) -> Result<PageNo, StorageError> {
        let mut registry = self.registry.lock();
        let entry = registry
            .files
            .get_mut(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        let page_no = PageNo::new(entry.pages.len() as u32);
        entry.pages.push(PageData::new());
        Ok(page_no)
    }

    async fn page_count(&self, file: FileId) -> Result<u32, StorageError> {
        let registry = self.registry.lock();
        let entry = registry
            .files
            .get(&file)
            .ok_or(StorageError::UnknownFile(file))?;
        Ok(entry.pages.len() as u32)
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        // No durable medium behind this backend.
        Ok(())
    }
}
