//! Error types for dragonart-state

use thiserror::Error;

/// Errors that can occur in the durable storage layer.
///
/// Capacity exhaustion is reported separately from every other write failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing the value would push the store past its byte budget
    #[error("storage capacity exceeded writing {key}: {required} bytes required, capacity {capacity}")]
    CapacityExceeded {
        key: String,
        required: usize,
        capacity: usize,
    },

    /// Keys must be non-empty
    #[error("invalid storage key: {key:?}")]
    InvalidKey { key: String },

    /// Backend-specific failure (poisoned lock, injected fault, ...)
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this error means the store is out of space.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, StorageError::CapacityExceeded { .. })
    }
}
