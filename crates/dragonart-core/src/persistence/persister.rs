//! Save/load orchestration over a [`KvStore`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use dragonart_state::KvStore;

use super::compress::CompressionSettings;
use super::migration::{fill_missing_parents, migrate_linear_history, needs_migration};
use super::snapshot::{validate_shape, SessionSnapshot, SnapshotShapeError};
use crate::domain::{DragonArtError, EventLog, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::session::Session;

/// Shown in the event log when a stored snapshot could not be read.
const RESTORE_FAILED: &str = "Error: Could not restore previous session.";

/// Delays that keep saves from clobbering a snapshot that is still being
/// restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// No save is eligible until this long after loading begins
    /// (milliseconds).
    pub settle_ms: u64,
    /// After a successful restore, saves stay suppressed for this much
    /// longer (milliseconds).
    pub quiet_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            quiet_ms: 2_000,
        }
    }
}

impl GuardConfig {
    /// Saves become eligible as soon as loading has run.
    pub fn disabled() -> Self {
        Self {
            settle_ms: 0,
            quiet_ms: 0,
        }
    }
}

/// Why an automatic save did not write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Loading has not started or the settle delay has not elapsed.
    NotInitialized,
    /// A snapshot was just restored.
    JustRestored,
    /// A previous save hit the storage capacity.
    StorageFull,
}

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        bytes: usize,
        /// The session was flagged storage-full and no longer is.
        recovered: bool,
    },
    Skipped(SkipReason),
    CapacityExceeded,
    Failed(String),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// Result of the startup load.
#[derive(Debug)]
pub enum LoadOutcome {
    Restored(Session),
    /// Nothing usable was stored. The log carries any restore error lines.
    Fresh(EventLog),
}

/// Save-eligibility window, measured from when loading begins.
#[derive(Debug, Clone)]
pub struct SaveGuard {
    config: GuardConfig,
    load_started: Option<Instant>,
    restored: bool,
}

impl SaveGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            load_started: None,
            restored: false,
        }
    }

    fn begin_load(&mut self) {
        self.load_started = Some(Instant::now());
        self.restored = false;
    }

    fn mark_restored(&mut self) {
        self.restored = true;
    }

    /// `None` when a save may proceed now.
    pub fn check(&self) -> Option<SkipReason> {
        let Some(started) = self.load_started else {
            return Some(SkipReason::NotInitialized);
        };
        let elapsed = started.elapsed();
        let settle = Duration::from_millis(self.config.settle_ms);
        if elapsed < settle {
            return Some(SkipReason::NotInitialized);
        }
        if self.restored && elapsed < settle + Duration::from_millis(self.config.quiet_ms) {
            return Some(SkipReason::JustRestored);
        }
        None
    }
}

enum RestoreError {
    /// Structurally not a snapshot; discarded without a log entry.
    Shape(SnapshotShapeError),
    Corrupt { log: EventLog, reason: String },
}

/// Writes and reads the session snapshot.
///
/// Holds no session state of its own beyond the guard window.
pub struct SessionPersister {
    store: Arc<dyn KvStore>,
    key: String,
    compression: CompressionSettings,
    guard: SaveGuard,
}

impl SessionPersister {
    pub fn new(
        store: Arc<dyn KvStore>,
        key: impl Into<String>,
        compression: CompressionSettings,
        guard: GuardConfig,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            compression,
            guard: SaveGuard::new(guard),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn guard(&self) -> &SaveGuard {
        &self.guard
    }

    /// Read the stored snapshot once at startup.
    ///
    /// Unreadable snapshots are deleted and a fresh state is returned.
    pub async fn load(&mut self) -> LoadOutcome {
        self.guard.begin_load();

        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadOutcome::Fresh(EventLog::new()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read session snapshot");
                let mut log = EventLog::new();
                log.push(RESTORE_FAILED);
                return LoadOutcome::Fresh(log);
            }
        };

        match decode(&raw) {
            Ok(session) => {
                self.guard.mark_restored();
                LoadOutcome::Restored(session)
            }
            Err(RestoreError::Shape(reason)) => {
                obs::emit_snapshot_discarded(&reason);
                self.discard().await;
                LoadOutcome::Fresh(EventLog::new())
            }
            Err(RestoreError::Corrupt { mut log, reason }) => {
                obs::emit_snapshot_discarded(&reason);
                log.push(RESTORE_FAILED);
                self.discard().await;
                LoadOutcome::Fresh(log)
            }
        }
    }

    /// Automatic save after a state change.
    ///
    /// Skipped inside the guard window and while the session is flagged
    /// storage-full.
    pub async fn save(&self, session: &mut Session) -> SaveOutcome {
        if let Some(reason) = self.guard.check() {
            debug!(?reason, "save skipped");
            return SaveOutcome::Skipped(reason);
        }
        if session.is_storage_full() {
            return SaveOutcome::Skipped(SkipReason::StorageFull);
        }
        self.write(session).await
    }

    /// Save regardless of the guard window and the storage-full flag.
    pub async fn force_save(&self, session: &mut Session) -> SaveOutcome {
        self.write(session).await
    }

    /// Remove the stored snapshot.
    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&self.key).await?;
        Ok(())
    }

    async fn discard(&self) {
        if let Err(e) = self.store.delete(&self.key).await {
            warn!(key = %self.key, error = %e, "failed to discard unreadable snapshot");
        }
    }

    async fn write(&self, session: &mut Session) -> SaveOutcome {
        let snapshot = SessionSnapshot::capture(session);
        let settings = self.compression;
        let encoded = tokio::task::spawn_blocking(move || {
            serde_json::to_vec(&snapshot.compressed(settings))
        })
        .await;

        let bytes = match encoded {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return record_failure(session, &DragonArtError::from(e)),
            Err(e) => return record_failure(session, &DragonArtError::Task(e.to_string())),
        };

        match self.store.set(&self.key, &bytes).await {
            Ok(()) => {
                METRICS.inc_saves();
                obs::emit_session_saved(session.name(), bytes.len(), session.store().len());
                let recovered = session.is_storage_full();
                if recovered {
                    session.set_storage_full(false);
                    session
                        .log_mut()
                        .push("Storage space recovered. Session saved.");
                }
                SaveOutcome::Saved {
                    bytes: bytes.len(),
                    recovered,
                }
            }
            Err(e) if e.is_capacity_exceeded() => {
                METRICS.inc_capacity_failures();
                obs::emit_save_failed(session.name(), true, &e);
                if !session.is_storage_full() {
                    session.set_storage_full(true);
                    session
                        .log_mut()
                        .push("ERROR: Storage limit reached. Session not saved.");
                }
                SaveOutcome::CapacityExceeded
            }
            Err(e) => record_failure(session, &e),
        }
    }
}

fn record_failure(session: &mut Session, error: &dyn std::fmt::Display) -> SaveOutcome {
    obs::emit_save_failed(session.name(), false, error);
    session
        .log_mut()
        .push("ERROR: Could not save session progress.");
    SaveOutcome::Failed(error.to_string())
}

fn decode(raw: &[u8]) -> std::result::Result<Session, RestoreError> {
    let mut value: Value = serde_json::from_slice(raw).map_err(|e| RestoreError::Corrupt {
        log: EventLog::new(),
        reason: e.to_string(),
    })?;
    validate_shape(&value).map_err(RestoreError::Shape)?;

    let stored_log: Vec<String> = value
        .as_object_mut()
        .and_then(|fields| fields.remove("logMessages"))
        .and_then(|v| match v {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();
    let mut log = EventLog::restore(stored_log);
    log.push("Restoring previous session...");

    let mut unparented = 0;
    if let Some(history) = value.get_mut("history").and_then(Value::as_array_mut) {
        if needs_migration(history) {
            log.push("Migrating session to new efficient data structure...");
            let migrated = migrate_linear_history(history);
            obs::emit_session_migrated(migrated);
        } else {
            unparented = fill_missing_parents(history);
        }
    }

    let snapshot: SessionSnapshot = match serde_json::from_value(value) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return Err(RestoreError::Corrupt {
                log,
                reason: e.to_string(),
            })
        }
    };

    let (mut session, repairs) = snapshot.into_session(log);
    let repaired = unparented + repairs.reparented_to_root.len();
    if repaired > 0 {
        session.log_mut().push(format!(
            "Repaired {repaired} step(s) whose source was missing; they now derive from the main image."
        ));
    }
    let restored = format!("Session \"{}\" restored.", session.name());
    session.log_mut().push(restored);
    obs::emit_session_restored(session.name(), session.store().len(), repaired);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EditMode, GenerationMetadata, ImageData, ParentRef};
    use dragonart_state::MemoryKvStore;

    fn img(tag: u8) -> ImageData {
        ImageData::new("image/png", vec![tag])
    }

    fn persister(store: Arc<MemoryKvStore>, guard: GuardConfig) -> SessionPersister {
        SessionPersister::new(
            store,
            dragonart_state::SESSION_KEY,
            CompressionSettings::default(),
            guard,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn guard_window_blocks_early_saves_after_restore() {
        let store = Arc::new(MemoryKvStore::new());
        let mut writer = persister(store.clone(), GuardConfig::disabled());
        writer.load().await;
        let mut session = Session::new("S", img(0));
        assert!(writer.save(&mut session).await.is_saved());

        let mut reader = persister(store.clone(), GuardConfig::default());
        let LoadOutcome::Restored(mut restored) = reader.load().await else {
            panic!("expected restore");
        };
        assert_eq!(
            reader.save(&mut restored).await,
            SaveOutcome::Skipped(SkipReason::NotInitialized)
        );
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(
            reader.save(&mut restored).await,
            SaveOutcome::Skipped(SkipReason::JustRestored)
        );
        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert!(reader.save(&mut restored).await.is_saved());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_start_only_waits_for_settle() {
        let store = Arc::new(MemoryKvStore::new());
        let mut p = persister(store, GuardConfig::default());
        let mut session = Session::new("S", img(0));
        assert_eq!(
            p.save(&mut session).await,
            SaveOutcome::Skipped(SkipReason::NotInitialized)
        );
        assert!(matches!(p.load().await, LoadOutcome::Fresh(_)));
        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(p.save(&mut session).await.is_saved());
    }

    #[tokio::test]
    async fn non_capacity_failure_is_generic() {
        let store = Arc::new(MemoryKvStore::new());
        let mut p = persister(store.clone(), GuardConfig::disabled());
        p.load().await;
        let mut session = Session::new("S", img(0));
        session.append(
            img(1),
            ParentRef::Root,
            GenerationMetadata::new(EditMode::Edit, "p", "", "S"),
        );
        store.fail_writes("disk on fire");
        assert!(matches!(p.save(&mut session).await, SaveOutcome::Failed(_)));
        assert!(!session.is_storage_full());
        assert_eq!(
            session.log().latest().map(|l| l.ends_with("ERROR: Could not save session progress.")),
            Some(true)
        );
    }

    #[tokio::test]
    async fn garbage_snapshot_is_discarded_with_log_entry() {
        let store = Arc::new(MemoryKvStore::new());
        store.set(dragonart_state::SESSION_KEY, b"{not json").await.unwrap();
        let mut p = persister(store.clone(), GuardConfig::disabled());
        let LoadOutcome::Fresh(log) = p.load().await else {
            panic!("expected fresh start");
        };
        assert!(log.latest().unwrap().ends_with(RESTORE_FAILED));
        assert!(store.get(dragonart_state::SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shapeless_snapshot_is_discarded_silently() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .set(dragonart_state::SESSION_KEY, br#"{"history": []}"#)
            .await
            .unwrap();
        let mut p = persister(store.clone(), GuardConfig::disabled());
        let LoadOutcome::Fresh(log) = p.load().await else {
            panic!("expected fresh start");
        };
        assert!(log.is_empty());
        assert!(store.get(dragonart_state::SESSION_KEY).await.unwrap().is_none());
    }
}
