//! Export projector: orders a finished session for presentation and
//! packages it as a self-contained archive.
//!
//! Step numbers in file names are insertion positions, never display
//! positions, so a child's before-image reference stays valid however the
//! display order shuffles entries.

pub mod archive;
pub mod html;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Artifact, ArtifactId, EditMode, ImageData, ParentRef};
use crate::session::Session;

pub use archive::{archive_file_name, export_to_file, write_archive, ArchiveSummary};
pub use html::render_viewer_html;

/// Folder inside the archive that holds every image.
pub const IMAGES_DIR: &str = "images";

/// Name of the viewer document inside the archive.
pub const INDEX_FILE: &str = "index.html";

const ROOT_STEM: &str = "source_image";

/// One artifact as it appears in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub artifact_id: ArtifactId,
    /// One-based insertion position.
    pub step: usize,
    pub mode: EditMode,
    pub caption: String,
    pub after_file: String,
    /// Present for comparison modes only.
    pub before_file: Option<String>,
}

impl ExportEntry {
    pub fn is_comparison(&self) -> bool {
        self.before_file.is_some()
    }
}

/// Display-ordered projection of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPlan {
    pub session_name: String,
    pub root_file: String,
    pub entries: Vec<ExportEntry>,
    pub exported_at: DateTime<Utc>,
}

impl ExportPlan {
    pub fn comparisons(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.iter().filter(|e| e.is_comparison())
    }

    pub fn gallery(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.iter().filter(|e| !e.is_comparison())
    }
}

/// File name of the root image inside [`IMAGES_DIR`].
pub fn root_file_name(root: &ImageData) -> String {
    format!("{ROOT_STEM}.{}", root.extension())
}

/// File name of the after-image of the artifact at `step`.
pub fn step_file_name(step: usize, image: &ImageData) -> String {
    format!("step_{step}_after.{}", image.extension())
}

/// Project `session` into display order.
///
/// Entries sort by mode rank (unlisted modes last) and then by creation
/// time; equal keys keep insertion order.
pub fn plan_export(session: &Session) -> ExportPlan {
    plan_export_at(session, Utc::now())
}

/// [`plan_export`] with a fixed timestamp.
pub fn plan_export_at(session: &Session, exported_at: DateTime<Utc>) -> ExportPlan {
    let history = session.store().artifacts();
    let root_file = root_file_name(session.root());

    let mut order: Vec<usize> = (0..history.len()).collect();
    order.sort_by_key(|&i| {
        let artifact = &history[i];
        (
            artifact.edit_mode().display_rank(),
            artifact.metadata().created_at,
        )
    });

    let entries = order
        .into_iter()
        .map(|index| {
            let artifact = &history[index];
            let step = index + 1;
            let mode = artifact.edit_mode();
            let before_file = mode
                .is_comparison()
                .then(|| before_file_name(history, artifact, &root_file));
            ExportEntry {
                artifact_id: artifact.id().clone(),
                step,
                mode: mode.clone(),
                caption: format!("{} - Step {step} ({mode})", session.name()),
                after_file: step_file_name(step, artifact.after_image()),
                before_file,
            }
        })
        .collect();

    ExportPlan {
        session_name: session.name().to_string(),
        root_file,
        entries,
        exported_at,
    }
}

/// Resolve through the unsorted history so step numbers match file names.
fn before_file_name(history: &[Artifact], artifact: &Artifact, root_file: &str) -> String {
    match artifact.parent_id() {
        ParentRef::Root => root_file.to_string(),
        ParentRef::Artifact(parent_id) => history
            .iter()
            .position(|a| a.id() == parent_id)
            .map(|i| step_file_name(i + 1, history[i].after_image()))
            .unwrap_or_else(|| root_file.to_string()),
    }
}
