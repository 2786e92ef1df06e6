//! Artifacts: one generated image plus its lineage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::ImageData;
use super::mode::EditMode;

/// Sentinel stored in `parentId` for artifacts derived from the root image.
pub const ROOT_SENTINEL: &str = "root";

/// Opaque, immutable artifact identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        ArtifactId(format!("id_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        ArtifactId(s.to_string())
    }
}

impl From<String> for ArtifactId {
    fn from(s: String) -> Self {
        ArtifactId(s)
    }
}

/// What an artifact was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParentRef {
    /// The session's root source image.
    Root,
    /// Another artifact's after-image.
    Artifact(ArtifactId),
}

impl ParentRef {
    pub fn is_root(&self) -> bool {
        matches!(self, ParentRef::Root)
    }

    pub fn artifact_id(&self) -> Option<&ArtifactId> {
        match self {
            ParentRef::Root => None,
            ParentRef::Artifact(id) => Some(id),
        }
    }

    pub fn points_to(&self, id: &ArtifactId) -> bool {
        self.artifact_id() == Some(id)
    }
}

impl From<String> for ParentRef {
    fn from(s: String) -> Self {
        if s == ROOT_SENTINEL {
            ParentRef::Root
        } else {
            ParentRef::Artifact(ArtifactId(s))
        }
    }
}

impl From<ParentRef> for String {
    fn from(parent: ParentRef) -> Self {
        match parent {
            ParentRef::Root => ROOT_SENTINEL.to_string(),
            ParentRef::Artifact(id) => id.0,
        }
    }
}

impl From<ArtifactId> for ParentRef {
    fn from(id: ArtifactId) -> Self {
        ParentRef::Artifact(id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => f.write_str(ROOT_SENTINEL),
            ParentRef::Artifact(id) => f.write_str(id.as_str()),
        }
    }
}

/// Short structured description of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub description: String,
    pub alt_text: String,
    /// Comma-separated keywords.
    pub seo_keywords: String,
}

/// How an artifact was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub edit_mode: EditMode,

    /// Full instruction sent to the generator.
    pub prompt: String,

    /// The user's free-text part of the instruction.
    #[serde(default)]
    pub custom_prompt: String,

    /// Description of the source image, when one was derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_metadata: Option<ImageMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_metadata: Option<ImageMetadata>,

    /// Milliseconds since the Unix epoch on the wire; epoch when absent.
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub session_name: String,
}

impl GenerationMetadata {
    pub fn new(
        edit_mode: EditMode,
        prompt: impl Into<String>,
        custom_prompt: impl Into<String>,
        session_name: impl Into<String>,
    ) -> Self {
        Self {
            edit_mode,
            prompt: prompt.into(),
            custom_prompt: custom_prompt.into(),
            before_metadata: None,
            after_metadata: None,
            created_at: Utc::now(),
            session_name: session_name.into(),
        }
    }

    pub fn with_before_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.before_metadata = Some(metadata);
        self
    }
}

/// One generated result.
///
/// `id` and `after_image` never change after creation. `parent_id` only
/// changes through tree repair when the parent is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    id: ArtifactId,
    parent_id: ParentRef,
    #[serde(rename = "after")]
    after_image: ImageData,
    #[serde(flatten)]
    metadata: GenerationMetadata,
}

impl Artifact {
    pub(crate) fn new(
        after_image: ImageData,
        parent_id: ParentRef,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            parent_id,
            after_image,
            metadata,
        }
    }

    /// Rebuild an artifact whose id already exists (snapshot restore).
    pub(crate) fn from_parts(
        id: ArtifactId,
        parent_id: ParentRef,
        after_image: ImageData,
        metadata: GenerationMetadata,
    ) -> Self {
        Self {
            id,
            parent_id,
            after_image,
            metadata,
        }
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn parent_id(&self) -> &ParentRef {
        &self.parent_id
    }

    pub fn after_image(&self) -> &ImageData {
        &self.after_image
    }

    pub fn metadata(&self) -> &GenerationMetadata {
        &self.metadata
    }

    pub fn edit_mode(&self) -> &EditMode {
        &self.metadata.edit_mode
    }

    pub(crate) fn reparent(&mut self, parent: ParentRef) {
        self.parent_id = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_ref_serializes_root_sentinel() {
        assert_eq!(serde_json::to_string(&ParentRef::Root).unwrap(), "\"root\"");
        let parent: ParentRef = serde_json::from_str("\"id_abc\"").unwrap();
        assert_eq!(parent, ParentRef::Artifact("id_abc".into()));
    }

    #[test]
    fn fresh_ids_are_unique() {
        assert_ne!(ArtifactId::new(), ArtifactId::new());
        assert!(ArtifactId::new().as_str().starts_with("id_"));
    }

    #[test]
    fn artifact_uses_stored_field_names() {
        let artifact = Artifact::new(
            ImageData::new("image/png", vec![1u8]),
            ParentRef::Root,
            GenerationMetadata::new(EditMode::Bw, "make it bw", "", "S"),
        );
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["parentId"], "root");
        assert_eq!(value["editMode"], "bw");
        assert!(value["after"].as_str().unwrap().starts_with("data:image/png"));
        assert!(value["createdAt"].is_i64());
        assert!(value.get("beforeMetadata").is_none());
    }

    #[test]
    fn missing_created_at_defaults_to_epoch() {
        let json = serde_json::json!({
            "id": "id_1",
            "parentId": "root",
            "after": "data:image/png;base64,AQ==",
            "prompt": "p",
            "editMode": "edit",
        });
        let artifact: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(artifact.metadata().created_at.timestamp_millis(), 0);
        assert_eq!(artifact.metadata().session_name, "");
    }
}
