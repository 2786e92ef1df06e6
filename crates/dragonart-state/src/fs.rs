use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

/// Filesystem-backed key-value store with git-style 2-char sharding and a
/// byte budget.
///
/// Layout: `<root>/kv/<first 2 hex chars>/<remaining hex chars>` where the
/// hex is the SHA-256 of the key.
pub struct FsKvStore {
    kv_dir: PathBuf,
    capacity: Option<usize>,
}

impl FsKvStore {
    /// Create an unbounded `FsKvStore` rooted at `root`. Creates `root/kv/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let kv_dir = root.as_ref().join("kv");
        fs::create_dir_all(&kv_dir)?;
        Ok(Self {
            kv_dir,
            capacity: None,
        })
    }

    /// Limit the total size of stored values to `bytes`.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    fn value_path(&self, key: &str) -> PathBuf {
        let hex = hex::encode(Sha256::digest(key.as_bytes()));
        self.kv_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn file_len(path: &Path) -> StorageResult<usize> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len() as usize),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn total_bytes(&self) -> StorageResult<usize> {
        let mut total = 0usize;
        for shard in fs::read_dir(&self.kv_dir)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    total += entry.metadata()?.len() as usize;
                }
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl KvStore for FsKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.value_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.value_path(key);
        let existing = Self::file_len(&path)?;
        check_budget(
            key,
            self.capacity,
            self.total_bytes()?,
            existing,
            value.len(),
        )?;

        let shard_dir = path
            .parent()
            .ok_or_else(|| StorageError::Backend(format!("no shard directory for {key}")))?;
        fs::create_dir_all(shard_dir)?;

        // Atomic replace: write to temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(shard_dir)?;
        tmp.write_all(value)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, bytes = value.len(), "kv value written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn used_bytes(&self) -> StorageResult<usize> {
        self.total_bytes()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
