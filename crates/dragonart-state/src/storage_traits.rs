//! Storage trait definitions for DragonArt
//!
//! The session layer persists a single snapshot under one well-known key.
//! Backends implement `KvStore`: a byte-valued key-value store with an
//! optional hard capacity. In-memory fakes live in the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key the editor session snapshot is stored under.
pub const SESSION_KEY: &str = "dragonArtSession";

/// Byte-valued key-value store with a hard capacity.
///
/// Guarantees:
/// - `set` atomically replaces any previous value under the key.
/// - `set` fails with `StorageError::CapacityExceeded` (and leaves the prior
///   value untouched) when the new total would exceed `capacity()`.
/// - `delete` is a no-op for absent keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any prior value.
    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Total bytes currently held across all keys.
    async fn used_bytes(&self) -> StorageResult<usize>;

    /// Byte budget, or `None` when unbounded.
    fn capacity(&self) -> Option<usize>;
}

/// Reject empty keys before they reach a backend.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Check a pending write against the budget.
///
/// `used` is the current total and `existing` the size of the value being
/// replaced, which is freed by the write.
pub(crate) fn check_budget(
    key: &str,
    capacity: Option<usize>,
    used: usize,
    existing: usize,
    incoming: usize,
) -> StorageResult<()> {
    if let Some(capacity) = capacity {
        let required = used.saturating_sub(existing) + incoming;
        if required > capacity {
            return Err(StorageError::CapacityExceeded {
                key: key.to_string(),
                required,
                capacity,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_counts_replaced_value_as_freed() {
        assert!(check_budget("k", Some(10), 8, 8, 10).is_ok());
        assert!(check_budget("k", Some(10), 8, 0, 3).is_err());
    }

    #[test]
    fn unbounded_store_accepts_anything() {
        assert!(check_budget("k", None, usize::MAX - 1, 0, 1).is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(
            validate_key(""),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(validate_key(SESSION_KEY).is_ok());
    }
}
