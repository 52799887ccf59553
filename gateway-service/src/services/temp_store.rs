//! Transient storage for uploaded files.
//!
//! The upload layer writes each file once; the pipeline reads it once and
//! deletes it before the response goes out.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No stored file for key {0}")]
    NotFound(String),
}

#[async_trait]
pub trait TempStore: Send + Sync {
    /// Persist an upload and return the key identifying it.
    async fn write(&self, data: Vec<u8>) -> Result<String, StorageError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the stored file. Deleting a key that is already gone is a no-op.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Disk-backed store: one file per upload under the configured directory,
/// keyed by a fresh UUID.
pub struct LocalTempStore {
    base_path: PathBuf,
}

impl LocalTempStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }
}

#[async_trait]
impl TempStore for LocalTempStore {
    async fn write(&self, data: Vec<u8>) -> Result<String, StorageError> {
        let key = Uuid::new_v4().to_string();
        fs::write(self.base_path.join(&key), data).await?;
        Ok(key)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let data = fs::read(self.base_path.join(key)).await?;
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.base_path.join(key);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests: counts every operation and can fail reads or
/// deletes on demand.
#[derive(Default)]
pub struct MemoryTempStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    reads: AtomicUsize,
    deletes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryTempStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of files currently held.
    pub fn stored_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TempStore for MemoryTempStore {
    async fn write(&self, data: Vec<u8>) -> Result<String, StorageError> {
        let key = Uuid::new_v4().to_string();
        self.files.lock().unwrap().insert(key.clone(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "induced read failure",
            )));
        }
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "induced delete failure",
            )));
        }
        self.files.lock().unwrap().remove(key);
        Ok(())
    }
}
