//! The session entity: a named container for the artifact store, favourites,
//! cursor, and event log.

use serde::{Deserialize, Serialize};

use crate::domain::{
    Artifact, ArtifactId, DragonArtError, EventLog, GenerationMetadata, ImageData, ParentRef,
    Result,
};
use crate::navigation::{Cursor, Direction};
use crate::obs;
use crate::store::ArtifactStore;

/// Favourited artifact ids, in the order they were favourited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites(Vec<ArtifactId>);

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored ids, dropping duplicates.
    pub fn from_ids(ids: impl IntoIterator<Item = ArtifactId>) -> Self {
        let mut favorites = Self::new();
        for id in ids {
            if !favorites.contains(&id) {
                favorites.0.push(id);
            }
        }
        favorites
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.0.contains(id)
    }

    /// Add or remove `id`. Returns whether it is now a favourite.
    pub fn toggle(&mut self, id: &ArtifactId) -> bool {
        if self.remove(id) {
            false
        } else {
            self.0.push(id.clone());
            true
        }
    }

    /// Remove `id`. Returns whether it was present.
    pub fn remove(&mut self, id: &ArtifactId) -> bool {
        let before = self.0.len();
        self.0.retain(|f| f != id);
        self.0.len() != before
    }

    pub fn retain(&mut self, keep: impl FnMut(&ArtifactId) -> bool) {
        self.0.retain(keep);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArtifactId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named editing session.
///
/// Created when the user names a session for a root image; destroyed by
/// ending the session.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    store: ArtifactStore,
    favorites: Favorites,
    cursor: Cursor,
    log: EventLog,
    storage_full: bool,
}

impl Session {
    /// Start a fresh session over `root`.
    pub fn new(name: impl Into<String>, root: ImageData) -> Self {
        let name = name.into();
        let mut log = EventLog::new();
        log.push(format!("Session started: \"{name}\""));
        obs::emit_session_started(&name, root.len());
        Self {
            name,
            store: ArtifactStore::new(root),
            favorites: Favorites::new(),
            cursor: Cursor::none(),
            log,
            storage_full: false,
        }
    }

    pub(crate) fn from_parts(
        name: String,
        store: ArtifactStore,
        favorites: Favorites,
        cursor: Cursor,
        log: EventLog,
    ) -> Self {
        Self {
            name,
            store,
            favorites,
            cursor,
            log,
            storage_full: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ArtifactStore {
        &mut self.store
    }

    pub fn root(&self) -> &ImageData {
        self.store.root()
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub(crate) fn favorites_mut(&mut self) -> &mut Favorites {
        &mut self.favorites
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut EventLog {
        &mut self.log
    }

    /// Sticky flag set when a save hit the storage capacity.
    pub fn is_storage_full(&self) -> bool {
        self.storage_full
    }

    pub(crate) fn set_storage_full(&mut self, full: bool) {
        self.storage_full = full;
    }

    /// Artifact under the cursor.
    pub fn current(&self) -> Option<&Artifact> {
        self.cursor.index().and_then(|i| self.store.at(i))
    }

    /// One-based step number of the cursor, as shown to the user.
    pub fn current_step(&self) -> Option<usize> {
        self.cursor.index().map(|i| i + 1)
    }

    /// Append a generated image and select it.
    pub fn append(
        &mut self,
        after_image: ImageData,
        parent: ParentRef,
        metadata: GenerationMetadata,
    ) -> &Artifact {
        self.store.append(after_image, parent, metadata);
        let index = self.store.len() - 1;
        self.cursor = Cursor::at(index);
        let artifact = &self.store.artifacts()[index];
        obs::emit_artifact_appended(
            &self.name,
            artifact.id().as_str(),
            &artifact.parent_id().to_string(),
            artifact.edit_mode().as_str(),
        );
        artifact
    }

    /// Before-image of `artifact`, derived through its parent.
    pub fn resolve_before(&self, artifact: &Artifact) -> &ImageData {
        self.store.resolve_before(artifact)
    }

    /// Move the cursor one step. Returns whether it moved.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        self.cursor.step(direction, self.store.len())
    }

    /// Select a zero-based position.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if self.cursor.select(index, self.store.len()) {
            Ok(())
        } else {
            Err(DragonArtError::StepOutOfRange {
                step: index + 1,
                len: self.store.len(),
            })
        }
    }

    /// Toggle the current artifact's favourite state.
    ///
    /// Returns `None` when nothing is selected, else whether it is now a
    /// favourite.
    pub fn toggle_favorite_current(&mut self) -> Option<bool> {
        let id = self.current()?.id().clone();
        Some(self.favorites.toggle(&id))
    }

    /// Promote the current artifact's image to be the root source image.
    ///
    /// Future generations from source branch from it; root-parented
    /// artifacts now resolve their before-image to it too. Returns the
    /// promoted step number.
    pub fn set_as_source(&mut self) -> Option<usize> {
        let step = self.current_step()?;
        let image = self.current()?.after_image().clone();
        self.store.replace_root(image);
        self.log.push(format!(
            "Set Step {step} as the new primary image. Next generation will branch from this point."
        ));
        Some(step)
    }
}
