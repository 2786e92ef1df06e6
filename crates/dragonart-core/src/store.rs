//! Artifact store: the insertion-ordered artifact sequence plus the root
//! source image, with lazy "before" resolution by parent lookup.

use crate::domain::{Artifact, ArtifactId, GenerationMetadata, ImageData, ParentRef};

/// Owns every artifact of a session and the root source image.
///
/// Order is creation order and is independent of tree shape. Before-images
/// are never stored; they are always derived from the parent reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactStore {
    root: ImageData,
    artifacts: Vec<Artifact>,
}

impl ArtifactStore {
    pub fn new(root: ImageData) -> Self {
        Self {
            root,
            artifacts: Vec::new(),
        }
    }

    pub(crate) fn from_parts(root: ImageData, artifacts: Vec<Artifact>) -> Self {
        Self { root, artifacts }
    }

    pub fn root(&self) -> &ImageData {
        &self.root
    }

    /// Swap in a new root image, returning the old one.
    pub(crate) fn replace_root(&mut self, image: ImageData) -> ImageData {
        std::mem::replace(&mut self.root, image)
    }

    /// Append a new artifact at the end of the sequence. Never fails.
    pub(crate) fn append(
        &mut self,
        after_image: ImageData,
        parent: ParentRef,
        metadata: GenerationMetadata,
    ) -> &Artifact {
        self.artifacts
            .push(Artifact::new(after_image, parent, metadata));
        &self.artifacts[self.artifacts.len() - 1]
    }

    /// The image `artifact` was derived from.
    ///
    /// A parent that cannot be found resolves to the root image rather than
    /// failing.
    pub fn resolve_before(&self, artifact: &Artifact) -> &ImageData {
        match artifact.parent_id() {
            ParentRef::Root => &self.root,
            ParentRef::Artifact(parent) => self
                .get(parent)
                .map(Artifact::after_image)
                .unwrap_or(&self.root),
        }
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id() == id)
    }

    pub fn position(&self, id: &ArtifactId) -> Option<usize> {
        self.artifacts.iter().position(|a| a.id() == id)
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.position(id).is_some()
    }

    pub fn at(&self, index: usize) -> Option<&Artifact> {
        self.artifacts.get(index)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub(crate) fn artifacts_mut(&mut self) -> &mut Vec<Artifact> {
        &mut self.artifacts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifacts whose parent reference does not resolve. Empty whenever the
    /// store is consistent.
    pub fn dangling_parents(&self) -> Vec<&Artifact> {
        self.artifacts
            .iter()
            .filter(|a| match a.parent_id() {
                ParentRef::Root => false,
                ParentRef::Artifact(parent) => !self.contains(parent),
            })
            .collect()
    }

    /// Walk parent edges from `id` toward the root, starting with `id` itself.
    ///
    /// Stops at the root, at an unresolved parent, or after visiting every
    /// artifact once.
    pub fn lineage(&self, id: &ArtifactId) -> Vec<&Artifact> {
        let mut chain = Vec::new();
        let mut next = self.get(id);
        while let Some(artifact) = next {
            if chain.len() == self.artifacts.len() {
                break;
            }
            chain.push(artifact);
            next = artifact.parent_id().artifact_id().and_then(|p| self.get(p));
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EditMode;

    fn img(tag: u8) -> ImageData {
        ImageData::new("image/png", vec![tag])
    }

    fn meta() -> GenerationMetadata {
        GenerationMetadata::new(EditMode::Edit, "p", "", "S")
    }

    #[test]
    fn root_parent_resolves_to_root_image() {
        let mut store = ArtifactStore::new(img(0));
        let a = store.append(img(1), ParentRef::Root, meta()).clone();
        assert_eq!(store.resolve_before(&a), &img(0));
    }

    #[test]
    fn artifact_parent_resolves_to_parent_after_image() {
        let mut store = ArtifactStore::new(img(0));
        let a = store.append(img(1), ParentRef::Root, meta()).id().clone();
        let b = store.append(img(2), a.into(), meta()).clone();
        assert_eq!(store.resolve_before(&b), &img(1));
    }

    #[test]
    fn missing_parent_falls_back_to_root() {
        let mut store = ArtifactStore::new(img(0));
        let orphan = store
            .append(img(1), ArtifactId::from("id_gone").into(), meta())
            .clone();
        assert_eq!(store.resolve_before(&orphan), &img(0));
        assert_eq!(store.dangling_parents().len(), 1);
    }

    #[test]
    fn replaced_root_is_seen_by_root_children() {
        let mut store = ArtifactStore::new(img(0));
        let a = store.append(img(1), ParentRef::Root, meta()).clone();
        let old = store.replace_root(img(9));
        assert_eq!(old, img(0));
        assert_eq!(store.resolve_before(&a), &img(9));
    }

    #[test]
    fn lineage_walks_to_root() {
        let mut store = ArtifactStore::new(img(0));
        let a = store.append(img(1), ParentRef::Root, meta()).id().clone();
        let b = store.append(img(2), a.clone().into(), meta()).id().clone();
        let c = store.append(img(3), b.clone().into(), meta()).id().clone();
        let ids: Vec<_> = store.lineage(&c).iter().map(|x| x.id().clone()).collect();
        assert_eq!(ids, vec![c, b, a]);
    }
}
