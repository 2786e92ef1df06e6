//! Structured observability hooks for DragonArt session lifecycle events.
//!
//! This module provides:
//! - Session-scoped tracing spans via `SessionSpan` RAII guard
//! - Emission functions for history mutations, persistence, generation
//!   retries and exports
//!
//! Events are emitted at `info!` level; failures at `warn!`.

use tracing::{info, warn};

/// RAII guard that enters a session-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = SessionSpan::enter("Dragons");
/// // tracing calls are now associated with session = "Dragons"
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    /// Create and enter a span tagged with the session name.
    pub fn enter(session: &str) -> Self {
        let span = tracing::info_span!("dragonart.session", session = %session);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: session started over a root image of `root_bytes`.
pub fn emit_session_started(session: &str, root_bytes: usize) {
    info!(event = "session.started", session = %session, root_bytes = root_bytes);
}

/// Emit event: a generated artifact was appended to history.
pub fn emit_artifact_appended(session: &str, artifact_id: &str, parent_id: &str, mode: &str) {
    info!(
        event = "artifact.appended",
        session = %session,
        artifact_id = %artifact_id,
        parent_id = %parent_id,
        mode = %mode,
    );
}

/// Emit event: a single artifact was deleted.
pub fn emit_artifact_deleted(session: &str, artifact_id: &str, reparented: usize) {
    info!(
        event = "artifact.deleted",
        session = %session,
        artifact_id = %artifact_id,
        reparented = reparented,
    );
}

/// Emit event: the oldest entries were pruned.
pub fn emit_history_pruned(session: &str, removed: usize, reparented_to_root: usize) {
    info!(
        event = "history.pruned",
        session = %session,
        removed = removed,
        reparented_to_root = reparented_to_root,
    );
}

/// Emit event: snapshot written.
pub fn emit_session_saved(session: &str, bytes: usize, artifacts: usize) {
    info!(
        event = "session.saved",
        session = %session,
        bytes = bytes,
        artifacts = artifacts,
    );
}

/// Emit event: snapshot write failed (warning level).
pub fn emit_save_failed(session: &str, capacity_exceeded: bool, error: &dyn std::fmt::Display) {
    warn!(
        event = "session.save_failed",
        session = %session,
        capacity_exceeded = capacity_exceeded,
        error = %error,
    );
}

/// Emit event: session restored from storage.
pub fn emit_session_restored(session: &str, artifacts: usize, repaired: usize) {
    info!(
        event = "session.restored",
        session = %session,
        artifacts = artifacts,
        repaired = repaired,
    );
}

/// Emit event: a legacy snapshot was migrated to parent references.
pub fn emit_session_migrated(artifacts: usize) {
    info!(event = "session.migrated", artifacts = artifacts);
}

/// Emit event: a stored snapshot was unreadable and discarded (warning level).
pub fn emit_snapshot_discarded(reason: &dyn std::fmt::Display) {
    warn!(event = "session.snapshot_discarded", reason = %reason);
}

/// Emit event: a retryable generation failure, about to back off.
pub fn emit_generation_retry(attempt: u32, max_attempts: u32, delay_ms: u64) {
    warn!(
        event = "generation.retry",
        attempt = attempt,
        max_attempts = max_attempts,
        delay_ms = delay_ms,
    );
}

/// Emit event: a generation request failed for good (warning level).
pub fn emit_generation_failed(mode: &str, error: &dyn std::fmt::Display) {
    warn!(event = "generation.failed", mode = %mode, error = %error);
}

/// Emit event: export archive written.
pub fn emit_export_written(session: &str, entries: usize, bytes: u64) {
    info!(
        event = "export.written",
        session = %session,
        entries = entries,
        bytes = bytes,
    );
}
