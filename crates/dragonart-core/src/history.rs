//! History mutation with tree repair.
//!
//! Deleting artifacts never leaves a dangling parent reference:
//! - single deletion re-parents the victim's children to the victim's parent
//! - bulk deletion of the oldest entries re-parents orphans straight to root

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Artifact, ArtifactId, DragonArtError, ParentRef, Result};
use crate::obs;
use crate::session::Session;

/// Default number of entries removed by a bulk prune.
pub const DEFAULT_PRUNE_COUNT: usize = 10;

/// Outcome of deleting one artifact.
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub removed: Artifact,
    /// One-based position the artifact held before removal.
    pub step: usize,
    /// Children that now point at the removed artifact's parent.
    pub reparented: Vec<ArtifactId>,
    pub was_favorite: bool,
}

/// Outcome of a bulk prune.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub removed_ids: Vec<ArtifactId>,
    /// Survivors whose parent was pruned; they now derive from root.
    pub reparented_to_root: Vec<ArtifactId>,
    pub remaining_count: usize,
    pub storage_full_cleared: bool,
}

/// Delete `target`, re-parenting its direct children to its parent.
///
/// Returns `None` (and changes nothing) when `target` is not in the session.
pub fn delete_one(session: &mut Session, target: &ArtifactId) -> Option<DeleteReport> {
    let index = session.store().position(target)?;
    let removed = session.store_mut().artifacts_mut().remove(index);
    let replacement = removed.parent_id().clone();

    let mut reparented = Vec::new();
    for artifact in session.store_mut().artifacts_mut().iter_mut() {
        if artifact.parent_id().points_to(target) {
            artifact.reparent(replacement.clone());
            reparented.push(artifact.id().clone());
        }
    }

    let was_favorite = session.favorites_mut().remove(target);
    let len = session.store().len();
    session.cursor_mut().clamp_to(len);

    let step = index + 1;
    session.log_mut().push(format!("Step {step} deleted."));
    obs::emit_artifact_deleted(session.name(), target.as_str(), reparented.len());

    Some(DeleteReport {
        removed,
        step,
        reparented,
        was_favorite,
    })
}

/// Delete whatever the cursor points at.
pub fn delete_current(session: &mut Session) -> Option<DeleteReport> {
    let id = session.current()?.id().clone();
    delete_one(session, &id)
}

/// Delete the `count` oldest artifacts by insertion order.
///
/// Survivors whose parent was deleted are attached directly to root, even
/// when an older ancestor survives. Also clears the storage-full flag, since
/// pruning is the recovery action for it.
pub fn delete_oldest(session: &mut Session, count: usize) -> Result<PruneReport> {
    let available = session.store().len();
    if available < count {
        return Err(DragonArtError::NotEnoughHistory {
            required: count,
            available,
        });
    }

    let removed: Vec<Artifact> = session
        .store_mut()
        .artifacts_mut()
        .drain(..count)
        .collect();
    let removed_ids: Vec<ArtifactId> = removed.iter().map(|a| a.id().clone()).collect();
    let doomed: HashSet<&ArtifactId> = removed_ids.iter().collect();

    let mut reparented_to_root = Vec::new();
    for artifact in session.store_mut().artifacts_mut().iter_mut() {
        let orphaned = artifact
            .parent_id()
            .artifact_id()
            .is_some_and(|parent| doomed.contains(parent));
        if orphaned {
            artifact.reparent(ParentRef::Root);
            reparented_to_root.push(artifact.id().clone());
        }
    }

    session.favorites_mut().retain(|id| !doomed.contains(id));
    session.cursor_mut().shift_back(count);

    let storage_full_cleared = session.is_storage_full();
    session.set_storage_full(false);

    session
        .log_mut()
        .push(format!("{count} oldest steps deleted."));
    obs::emit_history_pruned(session.name(), count, reparented_to_root.len());

    Ok(PruneReport {
        remaining_count: session.store().len(),
        removed_ids,
        reparented_to_root,
        storage_full_cleared,
    })
}
