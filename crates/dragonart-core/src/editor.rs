//! The editor: event layer over the session model.
//!
//! Every user action maps to one method. Methods that change observable
//! session state finish with an automatic save, whose outcome feeds the
//! user-visible [`Notice`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dragonart_state::KvStore;

use crate::config::EditorConfig;
use crate::domain::{
    ArtifactId, DragonArtError, EditMode, EventLog, GenerationMetadata, ImageData, ImageMetadata,
    ParentRef, Result,
};
use crate::export::{export_to_file, ArchiveSummary};
use crate::generation::{GenerationError, GenerationRequest, ImageGenerator, MetadataDescriber};
use crate::history::{self, DeleteReport, PruneReport};
use crate::metrics::METRICS;
use crate::navigation::Direction;
use crate::obs;
use crate::persistence::{LoadOutcome, SaveOutcome, SessionPersister};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::session::Session;

const PERMISSION_DENIED_NOTICE: &str = "Permission Denied: the configured API key does not have access to the image model. Check the key and that its project has billing enabled.";

/// A user-visible banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Dismissible error, replaced by the next one.
    Error(String),
    /// Saving is blocked until space is recovered.
    StorageFull,
    /// Generation is blocked until credentials are reconfigured.
    PermissionDenied(String),
}

impl Notice {
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Notice::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Error(message) | Notice::PermissionDenied(message) => message,
            Notice::StorageFull => {
                "Storage limit reached. Cannot save session. Please download your work."
            }
        }
    }
}

/// What the user asked to generate.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub mode: EditMode,
    /// Full instruction for the generator.
    pub prompt: String,
    /// The user's free-text part of `prompt`.
    pub custom_prompt: String,
    pub references: Vec<ImageData>,
    /// Branch from the root image instead of the current step.
    pub from_source: bool,
}

impl GenerationOptions {
    pub fn new(mode: EditMode, prompt: impl Into<String>) -> Self {
        Self {
            mode,
            prompt: prompt.into(),
            custom_prompt: String::new(),
            references: Vec::new(),
            from_source: false,
        }
    }

    pub fn with_custom_prompt(mut self, custom: impl Into<String>) -> Self {
        self.custom_prompt = custom.into();
        self
    }

    pub fn with_references(mut self, references: Vec<ImageData>) -> Self {
        self.references = references;
        self
    }

    pub fn from_source(mut self, from_source: bool) -> Self {
        self.from_source = from_source;
        self
    }
}

/// An accepted generation, waiting for the collaborator's answer.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    parent: ParentRef,
    source: ImageData,
    references: Vec<ImageData>,
    mode: EditMode,
    prompt: String,
    custom_prompt: String,
    description: Option<ImageMetadata>,
}

impl GenerationTicket {
    pub fn parent(&self) -> &ParentRef {
        &self.parent
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn description(&self) -> Option<&ImageMetadata> {
        self.description.as_ref()
    }

    /// The instruction actually sent, with the source description appended
    /// for modes that need one.
    pub fn full_prompt(&self) -> String {
        match &self.description {
            Some(metadata) if self.mode.requires_description() => {
                format!("{}\n\nSubject description: {}", self.prompt, metadata.description)
            }
            _ => self.prompt.clone(),
        }
    }

    fn request(&self) -> GenerationRequest {
        GenerationRequest {
            source: self.source.clone(),
            references: self.references.clone(),
            prompt: self.full_prompt(),
        }
    }
}

/// Event-log line for a scheduled retry.
pub fn retry_log_line(attempt: u32, max_attempts: u32, delay: Duration) -> String {
    let seconds = (delay.as_millis() as f64 / 1000.0).round() as u64;
    format!("API rate limit hit. Retrying attempt {attempt}/{max_attempts} in {seconds}s...")
}

/// Runs tickets against the collaborators. Owns no session state, so it can
/// run while the editor keeps handling other events.
#[derive(Clone)]
pub struct GenerationWorker {
    generator: Arc<dyn ImageGenerator>,
    describer: Arc<dyn MetadataDescriber>,
    retry: RetryPolicy,
}

impl GenerationWorker {
    /// Fetch a description if the mode needs one, then generate with retry.
    ///
    /// `progress` receives event-log lines as they happen.
    pub async fn run(
        &self,
        ticket: &mut GenerationTicket,
        mut progress: impl FnMut(String),
    ) -> std::result::Result<ImageData, GenerationError> {
        let max_attempts = self.retry.max_attempts;

        if ticket.mode.requires_description() && ticket.description.is_none() {
            progress(
                "Action Figure mode requires an image description. Generating one now...".into(),
            );
            let source = &ticket.source;
            let metadata = retry_with_backoff(
                &self.retry,
                GenerationError::is_retryable,
                |_, _| METRICS.inc_generation_retries(),
                || self.describer.describe_image(source),
            )
            .await?;
            progress(format!("Description generated: \"{}\"", metadata.description));
            ticket.description = Some(metadata);
        }

        let request = ticket.request();
        let preview: String = request.prompt.chars().take(150).collect();
        progress(format!("Prompt (truncated): \"{preview}...\""));

        let result = retry_with_backoff(
            &self.retry,
            GenerationError::is_retryable,
            |attempt, delay| {
                METRICS.inc_generation_retries();
                obs::emit_generation_retry(attempt, max_attempts, delay.as_millis() as u64);
                progress(retry_log_line(attempt, max_attempts, delay));
            },
            || self.generator.generate(&request),
        )
        .await;

        if let Err(ref e) = result {
            obs::emit_generation_failed(ticket.mode.as_str(), e);
        }
        result
    }
}

/// Owns the active session and mediates every change to it.
pub struct Editor {
    config: EditorConfig,
    persister: SessionPersister,
    worker: GenerationWorker,
    session: Option<Session>,
    /// Log shown while no session is active.
    standby_log: EventLog,
    loading: bool,
    credentials_valid: bool,
    notice: Option<Notice>,
    last_save: Option<SaveOutcome>,
}

impl Editor {
    /// Build an editor and restore any stored session.
    pub async fn open(
        config: EditorConfig,
        store: Arc<dyn KvStore>,
        generator: Arc<dyn ImageGenerator>,
        describer: Arc<dyn MetadataDescriber>,
    ) -> Self {
        let mut persister = SessionPersister::new(
            store,
            config.storage_key.clone(),
            config.compression,
            config.guard,
        );
        let (session, standby_log) = match persister.load().await {
            LoadOutcome::Restored(session) => (Some(session), EventLog::new()),
            LoadOutcome::Fresh(log) => (None, log),
        };
        let worker = GenerationWorker {
            generator,
            describer,
            retry: config.retry.clone(),
        };
        Self {
            config,
            persister,
            worker,
            session,
            standby_log,
            loading: false,
            credentials_valid: true,
            notice: None,
            last_save: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn persister(&self) -> &SessionPersister {
        &self.persister
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The active session's log, or the standby log when none is active.
    pub fn log(&self) -> &EventLog {
        match &self.session {
            Some(session) => session.log(),
            None => &self.standby_log,
        }
    }

    fn log_mut(&mut self) -> &mut EventLog {
        match self.session.as_mut() {
            Some(session) => session.log_mut(),
            None => &mut self.standby_log,
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(DragonArtError::NoActiveSession)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn credentials_valid(&self) -> bool {
        self.credentials_valid
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn last_save(&self) -> Option<&SaveOutcome> {
        self.last_save.as_ref()
    }

    /// Dismiss the current notice if it is dismissible.
    pub fn dismiss_notice(&mut self) {
        if matches!(self.notice, Some(Notice::Error(_))) {
            self.notice = None;
        }
    }

    /// Credentials were re-entered; generation may be attempted again.
    pub fn configure_credentials(&mut self) {
        self.credentials_valid = true;
        if matches!(self.notice, Some(Notice::PermissionDenied(_))) {
            self.notice = None;
        }
    }

    async fn autosave(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = self.persister.save(session).await;
        self.apply_save_outcome(outcome);
    }

    fn apply_save_outcome(&mut self, outcome: SaveOutcome) {
        match &outcome {
            SaveOutcome::CapacityExceeded => self.notice = Some(Notice::StorageFull),
            SaveOutcome::Failed(_) if self.notice.is_none() => {
                self.notice = Some(Notice::Error("Could not save session progress.".into()));
            }
            SaveOutcome::Saved { .. } if self.notice == Some(Notice::StorageFull) => {
                self.notice = None;
            }
            _ => {}
        }
        self.last_save = Some(outcome);
    }

    /// Save immediately. `force` bypasses the guard window and the
    /// storage-full block.
    pub async fn save_now(&mut self, force: bool) -> Result<SaveOutcome> {
        let session = self.session.as_mut().ok_or(DragonArtError::NoActiveSession)?;
        let outcome = if force {
            self.persister.force_save(session).await
        } else {
            self.persister.save(session).await
        };
        self.apply_save_outcome(outcome.clone());
        Ok(outcome)
    }

    /// Begin a new session over `root`, replacing any active one.
    pub async fn start_session(&mut self, name: impl Into<String>, root: ImageData) {
        self.session = Some(Session::new(name, root));
        self.notice = None;
        self.autosave().await;
    }

    /// End the session and delete its stored snapshot. Irreversible.
    pub async fn end_session(&mut self) -> Result<()> {
        self.persister.clear().await?;
        self.session = None;
        self.standby_log = EventLog::new();
        self.notice = None;
        self.loading = false;
        Ok(())
    }

    /// Ask the describer for a short session title for `image`.
    pub async fn suggest_session_name(&mut self, image: &ImageData) -> Result<String> {
        self.log_mut().push("Fetching session name suggestions...");
        let describer = Arc::clone(&self.worker.describer);
        let result = retry_with_backoff(
            &self.config.retry,
            GenerationError::is_retryable,
            |_, _| {},
            || describer.suggest_title(image),
        )
        .await;
        match result {
            Ok(title) => {
                self.log_mut().push("Suggestions received.");
                Ok(title)
            }
            Err(e) => {
                self.log_mut().push("Error fetching suggestions.");
                self.notice = Some(Notice::Error(
                    "Could not fetch session name suggestions.".into(),
                ));
                Err(e.into())
            }
        }
    }

    pub async fn navigate(&mut self, direction: Direction) -> Result<bool> {
        let moved = self.session_mut()?.navigate(direction);
        if moved {
            self.autosave().await;
        }
        Ok(moved)
    }

    /// Select a one-based step.
    pub async fn select_step(&mut self, step: usize) -> Result<()> {
        let session = self.session_mut()?;
        let len = session.store().len();
        let index = step
            .checked_sub(1)
            .ok_or(DragonArtError::StepOutOfRange { step, len })?;
        session.select(index)?;
        self.autosave().await;
        Ok(())
    }

    /// Toggle the current step's favourite state. Returns the new state.
    pub async fn toggle_favorite(&mut self) -> Result<bool> {
        let now_favorite = self
            .session_mut()?
            .toggle_favorite_current()
            .ok_or(DragonArtError::NoSelection)?;
        self.autosave().await;
        Ok(now_favorite)
    }

    /// Promote the current step's image to be the root source image.
    pub async fn set_as_source(&mut self) -> Result<usize> {
        let step = self
            .session_mut()?
            .set_as_source()
            .ok_or(DragonArtError::NoSelection)?;
        self.autosave().await;
        Ok(step)
    }

    /// Delete the current step, re-parenting its children.
    pub async fn delete_current(&mut self) -> Result<DeleteReport> {
        let report =
            history::delete_current(self.session_mut()?).ok_or(DragonArtError::NoSelection)?;
        self.autosave().await;
        Ok(report)
    }

    /// Delete a step by id, re-parenting its children.
    pub async fn delete_step(&mut self, id: &ArtifactId) -> Result<DeleteReport> {
        let report = history::delete_one(self.session_mut()?, id)
            .ok_or_else(|| DragonArtError::ArtifactNotFound(id.to_string()))?;
        self.autosave().await;
        Ok(report)
    }

    /// Delete the `count` oldest steps. This is the recovery action for a
    /// full store, so it also lifts the storage-full block.
    pub async fn delete_oldest(&mut self, count: usize) -> Result<PruneReport> {
        let session = self.session_mut()?;
        match history::delete_oldest(session, count) {
            Ok(report) => {
                if self.notice == Some(Notice::StorageFull) {
                    self.notice = None;
                }
                self.autosave().await;
                Ok(report)
            }
            Err(e) => {
                let message =
                    format!("Need at least {count} steps in history to use this function.");
                session.log_mut().push(&message);
                self.notice = Some(Notice::Error(message));
                Err(e)
            }
        }
    }

    /// Worker for running tickets outside the editor borrow.
    pub fn generation_worker(&self) -> GenerationWorker {
        self.worker.clone()
    }

    /// Accept a generation request and mark the editor busy.
    pub fn begin_generation(&mut self, options: GenerationOptions) -> Result<GenerationTicket> {
        if self.loading {
            return Err(DragonArtError::GenerationInProgress);
        }
        if options.mode.is_video() {
            return Err(DragonArtError::UnsupportedMode(options.mode.clone()));
        }
        let session = self.session.as_mut().ok_or(DragonArtError::NoActiveSession)?;

        let from_source = options.from_source || session.current().is_none();
        let (parent, source, description) = match session.current() {
            Some(current) if !from_source => (
                ParentRef::from(current.id().clone()),
                current.after_image().clone(),
                current.metadata().after_metadata.clone(),
            ),
            _ => (ParentRef::Root, session.root().clone(), None),
        };

        let branch_note = if session.store().is_empty() {
            None
        } else if from_source {
            Some("'From Primary Image' is active. Generating from original source.".to_string())
        } else {
            session
                .current_step()
                .map(|step| format!("'Iterate' is active. Branching from Step {step}."))
        };
        let log = session.log_mut();
        log.push(format!("Starting generation with mode: {}...", options.mode));
        if let Some(note) = branch_note {
            log.push(note);
        }

        self.loading = true;
        self.dismiss_notice();
        Ok(GenerationTicket {
            parent,
            source,
            references: options.references,
            mode: options.mode,
            prompt: options.prompt,
            custom_prompt: options.custom_prompt,
            description,
        })
    }

    /// Record a ticket's outcome: append on success, surface the error
    /// otherwise. Clears the busy flag either way.
    pub async fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: std::result::Result<ImageData, GenerationError>,
    ) -> Result<ArtifactId> {
        self.loading = false;
        let result = match outcome {
            Ok(image) => self.append_generated(ticket, image),
            Err(e) => Err(self.record_generation_failure(e)),
        };
        self.log_mut().push("Generation process finished.");
        self.autosave().await;
        result
    }

    fn append_generated(
        &mut self,
        ticket: GenerationTicket,
        image: ImageData,
    ) -> Result<ArtifactId> {
        let session = self.session_mut()?;
        let prompt = ticket.full_prompt();

        let mut parent = ticket.parent;
        if let ParentRef::Artifact(id) = &parent {
            if !session.store().contains(id) {
                session.log_mut().push(
                    "Source step was deleted during generation. Result attached to the primary image.",
                );
                parent = ParentRef::Root;
            }
        }

        let mut metadata =
            GenerationMetadata::new(ticket.mode, prompt, ticket.custom_prompt, session.name());
        metadata.before_metadata = ticket.description;

        session.log_mut().push("Image successfully generated by AI.");
        let id = session.append(image, parent, metadata).id().clone();
        METRICS.inc_artifacts_generated();
        Ok(id)
    }

    fn record_generation_failure(&mut self, error: GenerationError) -> DragonArtError {
        if error.is_permission_denied() {
            self.credentials_valid = false;
            self.notice = Some(Notice::PermissionDenied(PERMISSION_DENIED_NOTICE.into()));
            self.log_mut()
                .push(format!("CRITICAL ERROR: {PERMISSION_DENIED_NOTICE}"));
        } else {
            let message = error.message().to_string();
            self.log_mut().push(format!("ERROR: {message}"));
            self.notice = Some(Notice::Error(message));
        }
        error.into()
    }

    /// Begin, run and complete a generation in one call.
    pub async fn generate(&mut self, options: GenerationOptions) -> Result<ArtifactId> {
        let mut ticket = self.begin_generation(options)?;
        let worker = self.generation_worker();
        let outcome = {
            let log = self.log_mut();
            worker.run(&mut ticket, |line| {
                log.push(line);
            })
            .await
        };
        self.complete_generation(ticket, outcome).await
    }

    /// Write the current step's image into `dir` as
    /// `{session}_step_{n}.{ext}`.
    pub async fn download_current(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let session = self.session.as_ref().ok_or(DragonArtError::NoActiveSession)?;
        let (artifact, step) = session
            .current()
            .zip(session.current_step())
            .ok_or(DragonArtError::NoSelection)?;
        let file_name = format!(
            "{}_step_{step}.{}",
            session.name(),
            artifact.after_image().extension()
        );
        let path = dir.as_ref().join(&file_name);
        tokio::fs::write(&path, artifact.after_image().bytes()).await?;

        self.log_mut().push(format!("Saved to disk: {file_name}"));
        self.autosave().await;
        Ok(path)
    }

    /// Export the session as a zip archive at `path`.
    pub async fn export(&mut self, path: impl AsRef<Path>) -> Result<ArchiveSummary> {
        let path = path.as_ref();
        let session = self.session_mut()?;
        if session.store().is_empty() {
            return Err(DragonArtError::Export("no session history to export".into()));
        }
        session
            .log_mut()
            .push("Preparing session download as HTML gallery...");

        self.loading = true;
        let result = match self.session.as_ref() {
            Some(session) => export_to_file(session, path).await,
            None => Err(DragonArtError::NoActiveSession),
        };
        self.loading = false;

        match &result {
            Ok(summary) => {
                let line = format!(
                    "Session gallery written to {} ({} files).",
                    path.display(),
                    summary.files
                );
                self.log_mut().push(line);
            }
            Err(e) => {
                self.log_mut()
                    .push(format!("ERROR: Could not create session zip. {e}"));
                self.notice = Some(Notice::Error(format!("Failed to create session zip: {e}")));
            }
        }
        self.autosave().await;
        result
    }
}
