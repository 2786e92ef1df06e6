//! The stored snapshot shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::compress::{compress_for_storage, CompressionSettings};
use crate::domain::{Artifact, ArtifactId, EventLog, ImageData, ParentRef};
use crate::navigation::Cursor;
use crate::session::{Favorites, Session};
use crate::store::ArtifactStore;

/// Everything needed to rebuild a session.
///
/// Before-images are never stored; they are re-derived from parent
/// references on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub main_image: ImageData,
    pub session_name: String,
    pub history: Vec<Artifact>,
    /// Signed cursor, `-1` for no selection. Absent means "last".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_index: Option<i64>,
    #[serde(default)]
    pub favorites: Vec<ArtifactId>,
    /// Newest first.
    #[serde(default)]
    pub log_messages: Vec<String>,
}

/// Why a stored value cannot be a snapshot at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotShapeError {
    #[error("snapshot is not a JSON object")]
    NotAnObject,
    #[error("snapshot has no session name")]
    MissingName,
    #[error("snapshot has no main image")]
    MissingMainImage,
    #[error("snapshot history is not a list")]
    HistoryNotAList,
}

/// Check the three fields a snapshot cannot do without.
pub fn validate_shape(value: &Value) -> Result<(), SnapshotShapeError> {
    let fields = value.as_object().ok_or(SnapshotShapeError::NotAnObject)?;
    let non_empty = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    if !non_empty("sessionName") {
        return Err(SnapshotShapeError::MissingName);
    }
    if !non_empty("mainImage") {
        return Err(SnapshotShapeError::MissingMainImage);
    }
    if !fields.get("history").is_some_and(Value::is_array) {
        return Err(SnapshotShapeError::HistoryNotAList);
    }
    Ok(())
}

/// What restoring had to fix up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreRepairs {
    /// Artifacts whose parent did not resolve and now point at root.
    pub reparented_to_root: Vec<ArtifactId>,
    /// Favourites naming artifacts that no longer exist.
    pub dropped_favorites: usize,
}

impl SessionSnapshot {
    /// Copy the persistent parts of `session`.
    pub fn capture(session: &Session) -> Self {
        Self {
            main_image: session.root().clone(),
            session_name: session.name().to_string(),
            history: session.store().artifacts().to_vec(),
            current_index: Some(session.cursor().to_wire()),
            favorites: session.favorites().iter().cloned().collect(),
            log_messages: session.log().entries().to_vec(),
        }
    }

    /// Re-encode the root image and every after-image for storage.
    pub fn compressed(self, settings: CompressionSettings) -> Self {
        let history = self
            .history
            .iter()
            .map(|a| {
                Artifact::from_parts(
                    a.id().clone(),
                    a.parent_id().clone(),
                    compress_for_storage(a.after_image(), settings),
                    a.metadata().clone(),
                )
            })
            .collect();
        Self {
            main_image: compress_for_storage(&self.main_image, settings),
            history,
            ..self
        }
    }

    /// Rebuild a session, repairing anything that would break invariants.
    ///
    /// `log` is the event log already restored from this snapshot, possibly
    /// with restore-time entries on top.
    pub fn into_session(self, log: EventLog) -> (Session, RestoreRepairs) {
        let mut repairs = RestoreRepairs::default();
        let mut store = ArtifactStore::from_parts(self.main_image, self.history);

        let dangling: Vec<ArtifactId> = store
            .dangling_parents()
            .into_iter()
            .map(|a| a.id().clone())
            .collect();
        for artifact in store.artifacts_mut().iter_mut() {
            if dangling.contains(artifact.id()) {
                artifact.reparent(ParentRef::Root);
            }
        }
        repairs.reparented_to_root = dangling;

        let stored_favorites = self.favorites.len();
        let favorites = Favorites::from_ids(
            self.favorites
                .into_iter()
                .filter(|id| store.contains(id)),
        );
        repairs.dropped_favorites = stored_favorites.saturating_sub(favorites.len());

        let len = store.len();
        let wire = self.current_index.unwrap_or(len as i64 - 1);
        let cursor = Cursor::from_wire(wire, len);

        let session = Session::from_parts(self.session_name, store, favorites, cursor, log);
        (session, repairs)
    }
}
