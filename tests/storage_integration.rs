//! End-to-end tests over disk-backed storage.
//!
//! The heap layer is exercised against `FileStorage` in a temporary
//! directory: records written through one pool instance are flushed and
//! read back by a completely fresh instance over the same directory.

use haystack::buffer::{BufferPool, LruReplacer};
use haystack::heap::{self, HeapFile};
use haystack::storage::{FileStorage, Storage};
use tempfile::tempdir;

async fn disk_pool(dir: &std::path::Path, pool_size: usize) -> BufferPool<FileStorage, LruReplacer> {
    let storage = FileStorage::open(dir).await.unwrap();
    BufferPool::new(storage, LruReplacer::new(), pool_size)
}

#[tokio::test]
async fn test_heap_file_on_disk() {
    let dir = tempdir().unwrap();
    let pool = disk_pool(dir.path(), 8).await;

    heap::create(&pool, "disk_heap").await.unwrap();

    let mut handle = HeapFile::open(&pool, "disk_heap").await.unwrap();
    let (r1, r2) = {
        let mut writer = handle.writer();
        let r1 = writer.insert(b"persistent one").await.unwrap();
        let r2 = writer.insert(b"persistent two").await.unwrap();
        (r1, r2)
    };

    assert_eq!(handle.record(r1).await.unwrap(), b"persistent one");
    assert_eq!(handle.record(r2).await.unwrap(), b"persistent two");
    assert_eq!(handle.record_count(), 2);
}

#[tokio::test]
async fn test_records_survive_a_fresh_instance() {
    let dir = tempdir().unwrap();

    let (r1, r2) = {
        let pool = disk_pool(dir.path(), 8).await;
        heap::create(&pool, "survivor").await.unwrap();

        let rids = {
            let mut handle = HeapFile::open(&pool, "survivor").await.unwrap();
            let mut writer = handle.writer();
            let r1 = writer.insert(b"first life").await.unwrap();
            let r2 = writer.insert(b"second life").await.unwrap();
            (r1, r2)
        };

        // Push everything to disk before the pool goes away.
        let file = pool.storage().open_file("survivor").await.unwrap();
        pool.storage().close_file(file).unwrap();
        pool.flush_file(file).await.unwrap();
        rids
    };

    // Brand-new storage and pool over the same directory.
    let pool = disk_pool(dir.path(), 8).await;
    let mut handle = HeapFile::open(&pool, "survivor").await.unwrap();
    assert_eq!(handle.record_count(), 2);
    assert_eq!(handle.record(r1).await.unwrap(), b"first life");
    assert_eq!(handle.record(r2).await.unwrap(), b"second life");
}

#[tokio::test]
async fn test_multi_page_file_survives_a_fresh_instance() {
    let dir = tempdir().unwrap();
    let payload = vec![0x3Cu8; 780];

    {
        let pool = disk_pool(dir.path(), 4).await;
        heap::create(&pool, "big").await.unwrap();

        {
            let mut handle = HeapFile::open(&pool, "big").await.unwrap();
            let mut writer = handle.writer();
            for _ in 0..25 {
                writer.insert(&payload).await.unwrap();
            }
        }

        let file = pool.storage().open_file("big").await.unwrap();
        pool.storage().close_file(file).unwrap();
        pool.flush_file(file).await.unwrap();
        pool.storage().sync_all().await.unwrap();
    }

    let pool = disk_pool(dir.path(), 4).await;
    let mut handle = HeapFile::open(&pool, "big").await.unwrap();
    assert_eq!(handle.record_count(), 25);
    assert_eq!(handle.page_count(), 3);

    let mut scan = handle.scan();
    let mut seen = 0;
    while scan.next().await.unwrap().is_some() {
        assert_eq!(scan.record().await.unwrap(), payload);
        seen += 1;
    }
    assert_eq!(seen, 25);
}

#[tokio::test]
async fn test_create_then_destroy_restores_the_directory() {
    let dir = tempdir().unwrap();
    let pool = disk_pool(dir.path(), 4).await;

    heap::create(&pool, "ephemeral").await.unwrap();
    assert!(dir.path().join("ephemeral").exists());

    heap::destroy(&pool, "ephemeral").await.unwrap();
    assert!(!dir.path().join("ephemeral").exists());
}

#[tokio::test]
async fn test_recreated_name_starts_empty() {
    let dir = tempdir().unwrap();
    let pool = disk_pool(dir.path(), 4).await;

    heap::create(&pool, "phoenix").await.unwrap();
    {
        let mut handle = HeapFile::open(&pool, "phoenix").await.unwrap();
        let mut writer = handle.writer();
        writer.insert(b"old world").await.unwrap();
    }

    heap::destroy(&pool, "phoenix").await.unwrap();
    heap::create(&pool, "phoenix").await.unwrap();

    let mut handle = HeapFile::open(&pool, "phoenix").await.unwrap();
    assert_eq!(handle.record_count(), 0);
    let mut scan = handle.scan();
    assert_eq!(scan.next().await.unwrap(), None);
}
