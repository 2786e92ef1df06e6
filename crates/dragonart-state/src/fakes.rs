//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryKvStore`, a capacity-bounded store that satisfies the
//! `KvStore` contract without touching the filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

const UNBOUNDED: usize = usize::MAX;

/// In-memory key-value store backed by a `HashMap<key, bytes>`.
///
/// Like browser storage, both keys and values count toward the budget.
#[derive(Debug)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    capacity: AtomicUsize,
    injected_failure: Mutex<Option<String>>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: AtomicUsize::new(UNBOUNDED),
            injected_failure: Mutex::new(None),
        }
    }
}

impl MemoryKvStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store limited to `bytes` total.
    pub fn with_capacity(bytes: usize) -> Self {
        let store = Self::default();
        store.set_capacity(bytes);
        store
    }

    /// Change the byte budget (e.g. to simulate the user freeing space).
    pub fn set_capacity(&self, bytes: usize) {
        self.capacity.store(bytes, Ordering::Relaxed);
    }

    /// Make every subsequent `set` fail with a non-capacity backend error.
    pub fn fail_writes(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.injected_failure.lock() {
            *slot = Some(reason.into());
        }
    }

    /// Undo [`MemoryKvStore::fail_writes`].
    pub fn clear_failure(&self) {
        if let Ok(mut slot) = self.injected_failure.lock() {
            *slot = None;
        }
    }

    fn entries(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()))
    }

    fn footprint(key: &str, value: &[u8]) -> usize {
        key.len() + value.len()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        if let Some(reason) = self
            .injected_failure
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()))?
            .clone()
        {
            return Err(StorageError::Backend(reason));
        }

        let mut entries = self.entries()?;
        let used: usize = entries.iter().map(|(k, v)| Self::footprint(k, v)).sum();
        let existing = entries
            .get(key)
            .map(|v| Self::footprint(key, v))
            .unwrap_or(0);
        check_budget(
            key,
            self.capacity(),
            used,
            existing,
            Self::footprint(key, value),
        )?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.entries()?.remove(key);
        Ok(())
    }

    async fn used_bytes(&self) -> StorageResult<usize> {
        Ok(self
            .entries()?
            .iter()
            .map(|(k, v)| Self::footprint(k, v))
            .sum())
    }

    fn capacity(&self) -> Option<usize> {
        match self.capacity.load(Ordering::Relaxed) {
            UNBOUNDED => None,
            bytes => Some(bytes),
        }
    }
}
