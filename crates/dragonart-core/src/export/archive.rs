//! Zip packaging of an export plan.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{plan_export, render_viewer_html, ExportPlan, IMAGES_DIR, INDEX_FILE};
use crate::domain::{DragonArtError, ImageData, Result};
use crate::obs;
use crate::session::Session;

/// What went into an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Files written, the viewer document included.
    pub files: usize,
    pub bytes: u64,
}

/// Write `plan` for `session` as a zip: `index.html` plus `images/`.
pub fn write_archive<W: Write + Seek>(
    session: &Session,
    plan: &ExportPlan,
    writer: W,
) -> Result<ArchiveSummary> {
    let mut zip = ZipWriter::new(writer);
    // Images are already compressed; deflating them again gains nothing.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory(format!("{IMAGES_DIR}/"), stored)?;
    let mut files = 0;

    let mut add_image = |zip: &mut ZipWriter<W>, name: &str, image: &ImageData| -> Result<()> {
        zip.start_file(format!("{IMAGES_DIR}/{name}"), stored)?;
        zip.write_all(image.bytes())?;
        files += 1;
        Ok(())
    };

    add_image(&mut zip, &plan.root_file, session.root())?;
    for entry in &plan.entries {
        let artifact = session
            .store()
            .get(&entry.artifact_id)
            .ok_or_else(|| DragonArtError::ArtifactNotFound(entry.artifact_id.to_string()))?;
        add_image(&mut zip, &entry.after_file, artifact.after_image())?;
    }

    zip.start_file(INDEX_FILE, deflated)?;
    zip.write_all(render_viewer_html(plan).as_bytes())?;
    files += 1;

    let mut writer = zip.finish()?;
    let bytes = writer.stream_position()?;
    obs::emit_export_written(session.name(), files, bytes);
    Ok(ArchiveSummary { files, bytes })
}

/// Default archive file name for a session.
pub fn archive_file_name(session_name: &str) -> String {
    let stem: String = session_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{stem}_export.zip")
}

/// Plan and write an archive for `session` to `path` off the async runtime.
pub async fn export_to_file(session: &Session, path: impl Into<PathBuf>) -> Result<ArchiveSummary> {
    let session = session.clone();
    let path = path.into();
    tokio::task::spawn_blocking(move || write_to_path(&session, &path))
        .await
        .map_err(|e| DragonArtError::Task(e.to_string()))?
}

fn write_to_path(session: &Session, path: &Path) -> Result<ArchiveSummary> {
    let plan = plan_export(session);
    let file = std::fs::File::create(path)?;
    write_archive(session, &plan, file)
}
