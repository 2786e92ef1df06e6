//! Editor configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::persistence::{CompressionSettings, GuardConfig};
use crate::retry::RetryPolicy;

/// Browser-style storage budget: 5 MiB.
pub const DEFAULT_STORAGE_CAPACITY: usize = 5 * 1024 * 1024;

/// Everything the editor needs to know about its surroundings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorConfig {
    /// Directory holding the durable store.
    pub storage_dir: PathBuf,
    /// Byte budget of the durable store.
    pub storage_capacity: usize,
    /// Key the snapshot is stored under.
    pub storage_key: String,
    pub compression: CompressionSettings,
    pub guard: GuardConfig,
    pub retry: RetryPolicy,
    /// Generation service endpoint; generation is unavailable without one.
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_home(),
            storage_capacity: DEFAULT_STORAGE_CAPACITY,
            storage_key: dragonart_state::SESSION_KEY.to_string(),
            compression: CompressionSettings::default(),
            guard: GuardConfig::default(),
            retry: RetryPolicy::default(),
            endpoint: None,
            api_key: None,
            request_timeout_ms: 120_000,
        }
    }
}

fn default_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".dragonart"))
        .unwrap_or_else(|| PathBuf::from(".dragonart"))
}

impl EditorConfig {
    /// Defaults overlaid with `DRAGONART_HOME`, `DRAGONART_STORAGE_CAPACITY`,
    /// `DRAGONART_ENDPOINT` and `DRAGONART_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(home) = std::env::var("DRAGONART_HOME") {
            config.storage_dir = PathBuf::from(home);
        }
        if let Ok(raw) = std::env::var("DRAGONART_STORAGE_CAPACITY") {
            match raw.parse() {
                Ok(bytes) => config.storage_capacity = bytes,
                Err(e) => {
                    warn!(value = %raw, error = %e, "ignoring invalid DRAGONART_STORAGE_CAPACITY")
                }
            }
        }
        config.endpoint = std::env::var("DRAGONART_ENDPOINT").ok();
        config.api_key = std::env::var("DRAGONART_API_KEY").ok();
        config
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    pub fn with_storage_capacity(mut self, bytes: usize) -> Self {
        self.storage_capacity = bytes;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_compression(mut self, compression: CompressionSettings) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
