//! Upgrade of legacy linear histories to parent references.
//!
//! Legacy snapshots stored each entry with an inlined `before` image and no
//! `parentId`; each entry implicitly derived from the one before it. The
//! upgrade runs on raw JSON before typed decoding so nothing downstream
//! needs to know the legacy shape existed.

use serde_json::Value;

use crate::domain::{ArtifactId, ROOT_SENTINEL};

/// Whether `history` is in the legacy linear shape.
///
/// Decided by the first entry alone: a missing, null or empty `parentId`
/// marks the whole history as legacy.
pub fn needs_migration(history: &[Value]) -> bool {
    match history.first().map(|entry| entry.get("parentId")) {
        None => false,
        Some(None | Some(Value::Null)) => true,
        Some(Some(Value::String(parent))) => parent.is_empty(),
        Some(Some(_)) => false,
    }
}

/// Rewrite every entry to point at its predecessor (the first at root) and
/// drop the redundant `before` image. Returns the number of entries touched.
pub fn migrate_linear_history(history: &mut [Value]) -> usize {
    let mut previous = ROOT_SENTINEL.to_string();
    let mut migrated = 0;
    for entry in history.iter_mut() {
        let Some(fields) = entry.as_object_mut() else {
            continue;
        };
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = ArtifactId::new().as_str().to_string();
                fields.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        fields.insert("parentId".into(), Value::String(previous));
        fields.remove("before");
        previous = id;
        migrated += 1;
    }
    migrated
}

/// Point entries with a missing, null or empty `parentId` at the root in an
/// already-upgraded history. Returns the number of entries touched.
pub fn fill_missing_parents(history: &mut [Value]) -> usize {
    let mut filled = 0;
    for fields in history.iter_mut().filter_map(Value::as_object_mut) {
        let missing = match fields.get("parentId") {
            None | Some(Value::Null) => true,
            Some(Value::String(parent)) => parent.is_empty(),
            Some(_) => false,
        };
        if missing {
            fields.insert("parentId".into(), Value::String(ROOT_SENTINEL.to_string()));
            filled += 1;
        }
    }
    filled
}
