//! DragonArt - branching image edit sessions from the command line
//!
//! The `dragonart` command drives one persistent edit session stored under
//! `$DRAGONART_HOME` (default `~/.dragonart`).
//!
//! ## Commands
//!
//! - `start`: Begin a session over a source image
//! - `generate`: Run an AI edit from the current step or the source image
//! - `nav` / `select`: Move through history
//! - `delete` / `prune`: Remove steps, re-parenting their children
//! - `export`: Write a zip gallery of the whole session

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use dragonart_core::export::archive_file_name;
use dragonart_core::metrics::METRICS;
use dragonart_core::obs::SessionSpan;
use dragonart_core::persistence::GuardConfig;
use dragonart_core::{
    ArtifactId, Direction, EditMode, Editor, EditorConfig, FsKvStore, GenerationOptions,
    HttpGenerationClient, ImageData, ImageGenerator, MetadataDescriber, SaveOutcome, Unconfigured,
    DEFAULT_PRUNE_COUNT,
};

#[derive(Parser)]
#[command(name = "dragonart")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Branching AI image edit sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Storage directory (overrides DRAGONART_HOME)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Generation service endpoint (overrides DRAGONART_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// API key sent as a bearer token (overrides DRAGONART_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session over a source image, replacing any active one
    Start {
        /// Source image file (PNG, JPEG, WebP, GIF)
        image: PathBuf,

        /// Session name (suggested by the describer if omitted)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show the active session
    Status {
        /// Emit JSON instead of terminal text
        #[arg(long)]
        json: bool,
    },

    /// List every step in history order
    History,

    /// Show the session event log, newest first
    Log {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Generate a new step
    Generate {
        /// Edit mode (e.g. edit, freestyle, bw, actionFigure)
        #[arg(short, long, default_value = "edit")]
        mode: String,

        /// Instruction for the generator
        #[arg(short, long)]
        prompt: String,

        /// Free-text part of the instruction, kept for the record
        #[arg(long)]
        custom: Option<String>,

        /// Branch from the source image instead of the current step
        #[arg(long)]
        from_source: bool,

        /// Additional reference images
        #[arg(short, long)]
        reference: Vec<PathBuf>,
    },

    /// Move the cursor one step
    Nav {
        #[arg(value_enum)]
        direction: NavDirection,
    },

    /// Select a step by its one-based number
    Select { step: usize },

    /// Toggle the current step as a favourite
    Favorite,

    /// Delete the current step (or one by id)
    Delete {
        /// Artifact id to delete instead of the current step
        #[arg(long)]
        id: Option<String>,
    },

    /// Delete the oldest steps to free storage
    Prune {
        #[arg(short, long, default_value_t = DEFAULT_PRUNE_COUNT)]
        count: usize,
    },

    /// Make the current step's image the new source image
    SetSource,

    /// Write the current step's image to a directory
    Download {
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Export the session as a zip gallery
    Export {
        /// Archive path (default: <session>_export.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save the session now
    Save {
        /// Save even if storage was flagged full
        #[arg(long)]
        force: bool,
    },

    /// End the session and delete its saved state
    End,
}

#[derive(Clone, Copy, ValueEnum)]
enum NavDirection {
    Prev,
    Next,
}

impl From<NavDirection> for Direction {
    fn from(d: NavDirection) -> Self {
        match d {
            NavDirection::Prev => Direction::Prev,
            NavDirection::Next => Direction::Next,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dragonart_core::telemetry::init_tracing(cli.json, level);

    let config = resolve_config(&cli);
    if matches!(cli.command, Commands::Generate { .. }) && config.endpoint.is_none() {
        bail!("No generation endpoint configured. Set DRAGONART_ENDPOINT or pass --endpoint.");
    }
    let mut editor = open_editor(config).await?;

    let session_name = editor.session().map(|s| s.name().to_string());
    let _span = session_name.as_deref().map(SessionSpan::enter);

    let result = match cli.command {
        Commands::Start { image, name } => cmd_start(&mut editor, &image, name).await,
        Commands::Status { json } => cmd_status(&editor, json),
        Commands::History => cmd_history(&editor),
        Commands::Log { limit } => cmd_log(&editor, limit),
        Commands::Generate {
            mode,
            prompt,
            custom,
            from_source,
            reference,
        } => {
            cmd_generate(
                &mut editor,
                &mode,
                prompt,
                custom,
                from_source,
                &reference,
            )
            .await
        }
        Commands::Nav { direction } => cmd_nav(&mut editor, direction.into()).await,
        Commands::Select { step } => cmd_select(&mut editor, step).await,
        Commands::Favorite => cmd_favorite(&mut editor).await,
        Commands::Delete { id } => cmd_delete(&mut editor, id).await,
        Commands::Prune { count } => cmd_prune(&mut editor, count).await,
        Commands::SetSource => cmd_set_source(&mut editor).await,
        Commands::Download { output } => cmd_download(&mut editor, &output).await,
        Commands::Export { output } => cmd_export(&mut editor, output).await,
        Commands::Save { force } => cmd_save(&mut editor, force).await,
        Commands::End => cmd_end(&mut editor).await,
    };

    report_notice(&editor);
    METRICS.flush();
    result
}

/// Environment defaults overlaid with command-line flags.
///
/// Each invocation is its own process, so the restore guard window is off.
fn resolve_config(cli: &Cli) -> EditorConfig {
    let mut config = EditorConfig::from_env().with_guard(GuardConfig::disabled());
    if let Some(home) = &cli.home {
        config = config.with_storage_dir(home);
    }
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key);
    }
    config
}

async fn open_editor(config: EditorConfig) -> Result<Editor> {
    let store = FsKvStore::new(&config.storage_dir)
        .with_context(|| format!("Failed to open store at {}", config.storage_dir.display()))?
        .with_capacity(config.storage_capacity);

    let (generator, describer): (Arc<dyn ImageGenerator>, Arc<dyn MetadataDescriber>) =
        match &config.endpoint {
            Some(endpoint) => {
                let client = Arc::new(
                    HttpGenerationClient::new(
                        endpoint.clone(),
                        config.api_key.clone(),
                        config.request_timeout(),
                    )
                    .context("Failed to build generation client")?,
                );
                let generator: Arc<dyn ImageGenerator> = client.clone();
                let describer: Arc<dyn MetadataDescriber> = client;
                (generator, describer)
            }
            None => (Arc::new(Unconfigured), Arc::new(Unconfigured)),
        };

    Ok(Editor::open(config, Arc::new(store), generator, describer).await)
}

fn report_notice(editor: &Editor) {
    if let Some(notice) = editor.notice() {
        eprintln!("warning: {}", notice.message());
    }
}

async fn read_image(path: &Path) -> Result<ImageData> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    ImageData::from_encoded(bytes)
        .with_context(|| format!("Unrecognised image format: {}", path.display()))
}

/// Start a new session over an image file
async fn cmd_start(editor: &mut Editor, image_path: &Path, name: Option<String>) -> Result<()> {
    let image = read_image(image_path).await?;
    let name = match name {
        Some(name) => name,
        None => editor
            .suggest_session_name(&image)
            .await
            .context("Could not suggest a session name; pass --name")?,
    };
    if name.trim().is_empty() {
        bail!("Session name must not be empty");
    }

    info!(session = %name, bytes = image.len(), "starting session");
    editor.start_session(name.trim(), image).await;
    println!("Started session \"{}\"", name.trim());
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    session: String,
    steps: usize,
    current_step: Option<usize>,
    favorites: usize,
    storage_full: bool,
    credentials_valid: bool,
}

/// Show the active session
fn cmd_status(editor: &Editor, json: bool) -> Result<()> {
    let Some(session) = editor.session() else {
        if json {
            println!("null");
        } else {
            println!("No active session");
        }
        return Ok(());
    };

    let report = StatusReport {
        session: session.name().to_string(),
        steps: session.store().len(),
        current_step: session.current_step(),
        favorites: session.favorites().len(),
        storage_full: session.is_storage_full(),
        credentials_valid: editor.credentials_valid(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Session:   {}", report.session);
    println!("Steps:     {}", report.steps);
    match report.current_step {
        Some(step) => println!("Current:   Step {step}"),
        None => println!("Current:   source image"),
    }
    println!("Favorites: {}", report.favorites);
    if report.storage_full {
        println!("Storage:   FULL (run `dragonart prune` to recover)");
    }
    Ok(())
}

/// List every step in history order
fn cmd_history(editor: &Editor) -> Result<()> {
    let session = editor.session().ok_or_else(|| anyhow!("No active session"))?;
    if session.store().is_empty() {
        println!("No steps yet");
        return Ok(());
    }

    let current = session.cursor().index();
    for (index, artifact) in session.store().iter().enumerate() {
        let marker = if current == Some(index) { ">" } else { " " };
        let favorite = if session.favorites().contains(artifact.id()) {
            " [fav]"
        } else {
            ""
        };
        println!(
            "{marker} {:>3}  {}  {:<24} from {}{favorite}",
            index + 1,
            artifact.id(),
            artifact.edit_mode().to_string(),
            artifact.parent_id(),
        );
    }
    Ok(())
}

/// Show the session event log
fn cmd_log(editor: &Editor, limit: usize) -> Result<()> {
    for line in editor.log().entries().iter().take(limit) {
        println!("{line}");
    }
    Ok(())
}

/// Run one generation
async fn cmd_generate(
    editor: &mut Editor,
    mode: &str,
    prompt: String,
    custom: Option<String>,
    from_source: bool,
    references: &[PathBuf],
) -> Result<()> {
    let mode: EditMode = mode
        .parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Unknown edit mode: {mode}"))?;

    let mut images = Vec::with_capacity(references.len());
    for path in references {
        images.push(read_image(path).await?);
    }

    let options = GenerationOptions::new(mode, prompt)
        .with_custom_prompt(custom.unwrap_or_default())
        .with_references(images)
        .from_source(from_source);

    let id = editor.generate(options).await.context("Generation failed")?;
    let step = editor
        .session()
        .and_then(|s| s.current_step())
        .unwrap_or_default();
    println!("Generated Step {step} ({id})");
    Ok(())
}

async fn cmd_nav(editor: &mut Editor, direction: Direction) -> Result<()> {
    if editor.navigate(direction).await? {
        print_current(editor);
    } else {
        println!("Already at the {} end of history", direction);
    }
    Ok(())
}

async fn cmd_select(editor: &mut Editor, step: usize) -> Result<()> {
    editor.select_step(step).await?;
    print_current(editor);
    Ok(())
}

fn print_current(editor: &Editor) {
    if let Some((artifact, step)) = editor
        .session()
        .and_then(|s| s.current().zip(s.current_step()))
    {
        println!("Step {step}: {} ({})", artifact.edit_mode(), artifact.id());
    }
}

async fn cmd_favorite(editor: &mut Editor) -> Result<()> {
    if editor.toggle_favorite().await? {
        println!("Marked as favorite");
    } else {
        println!("Removed from favorites");
    }
    Ok(())
}

/// Delete one step, re-parenting its children
async fn cmd_delete(editor: &mut Editor, id: Option<String>) -> Result<()> {
    let report = match id {
        Some(id) => editor.delete_step(&ArtifactId::from(id)).await?,
        None => editor.delete_current().await?,
    };
    println!("Deleted Step {} ({})", report.step, report.removed.id());
    if !report.reparented.is_empty() {
        println!(
            "Re-attached {} child step(s) to its parent",
            report.reparented.len()
        );
    }
    Ok(())
}

/// Delete the oldest steps
async fn cmd_prune(editor: &mut Editor, count: usize) -> Result<()> {
    let report = editor.delete_oldest(count).await?;
    println!(
        "Deleted {} oldest step(s); {} remain",
        report.removed_ids.len(),
        report.remaining_count
    );
    if report.storage_full_cleared {
        println!("Storage block lifted");
    }
    Ok(())
}

async fn cmd_set_source(editor: &mut Editor) -> Result<()> {
    let step = editor.set_as_source().await?;
    println!("Step {step} is now the source image");
    Ok(())
}

async fn cmd_download(editor: &mut Editor, output: &Path) -> Result<()> {
    let path = editor
        .download_current(output)
        .await
        .context("Failed to download current step")?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Export the session as a zip gallery
async fn cmd_export(editor: &mut Editor, output: Option<PathBuf>) -> Result<()> {
    let path = match output {
        Some(path) => path,
        None => {
            let session = editor.session().ok_or_else(|| anyhow!("No active session"))?;
            PathBuf::from(archive_file_name(session.name()))
        }
    };
    let summary = editor
        .export(&path)
        .await
        .with_context(|| format!("Failed to export to {}", path.display()))?;
    println!(
        "Exported {} file(s), {} bytes, to {}",
        summary.files,
        summary.bytes,
        path.display()
    );
    Ok(())
}

async fn cmd_save(editor: &mut Editor, force: bool) -> Result<()> {
    match editor.save_now(force).await? {
        SaveOutcome::Saved { bytes, .. } => println!("Saved ({bytes} bytes)"),
        SaveOutcome::Skipped(reason) => println!("Save skipped: {reason:?}"),
        SaveOutcome::CapacityExceeded => bail!("Storage limit reached. Session not saved."),
        SaveOutcome::Failed(message) => bail!("Could not save session: {message}"),
    }
    Ok(())
}

async fn cmd_end(editor: &mut Editor) -> Result<()> {
    let name = editor.session().map(|s| s.name().to_string());
    editor.end_session().await?;
    match name {
        Some(name) => println!("Ended session \"{name}\""),
        None => println!("No active session"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragonart_core::generation::fakes::{ScriptedGenerator, StaticDescriber};
    use dragonart_core::{KvStore, MemoryKvStore};

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    async fn test_editor(store: Arc<MemoryKvStore>) -> Editor {
        let config = EditorConfig::default().with_guard(GuardConfig::disabled());
        Editor::open(
            config,
            store,
            Arc::new(ScriptedGenerator::new()),
            Arc::new(StaticDescriber::default()),
        )
        .await
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("dragon.png");
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13]);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_start_uses_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = test_editor(Arc::new(MemoryKvStore::new())).await;

        cmd_start(&mut editor, &write_png(dir.path()), None)
            .await
            .unwrap();

        let session = editor.session().unwrap();
        assert_eq!(session.name(), "Little Green Dragon");
        assert_eq!(session.root().mime(), "image/png");
    }

    #[tokio::test]
    async fn test_start_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let mut editor = test_editor(Arc::new(MemoryKvStore::new())).await;

        let err = cmd_start(&mut editor, &path, Some("S".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unrecognised image format"));
        assert!(editor.session().is_none());
    }

    #[tokio::test]
    async fn test_generate_delete_and_prune_flow() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryKvStore::new());
        let mut editor = test_editor(store.clone()).await;
        cmd_start(&mut editor, &write_png(dir.path()), Some("Flow".into()))
            .await
            .unwrap();

        for mode in ["edit", "bw", "mtgCard"] {
            cmd_generate(&mut editor, mode, "p".into(), None, false, &[])
                .await
                .unwrap();
        }
        assert_eq!(editor.session().unwrap().store().len(), 3);

        cmd_select(&mut editor, 2).await.unwrap();
        cmd_delete(&mut editor, None).await.unwrap();
        let session = editor.session().unwrap();
        assert_eq!(session.store().len(), 2);
        assert!(session.store().dangling_parents().is_empty());

        assert!(cmd_prune(&mut editor, 5).await.is_err());
        cmd_prune(&mut editor, 1).await.unwrap();
        assert_eq!(editor.session().unwrap().store().len(), 1);

        assert!(store
            .get(&editor.config().storage_key)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_generate_rejects_unknown_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = test_editor(Arc::new(MemoryKvStore::new())).await;
        cmd_start(&mut editor, &write_png(dir.path()), Some("S".into()))
            .await
            .unwrap();

        let err = cmd_generate(&mut editor, "hologram", "p".into(), None, false, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown edit mode"));
    }

    #[tokio::test]
    async fn test_export_defaults_to_session_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut editor = test_editor(Arc::new(MemoryKvStore::new())).await;
        cmd_start(&mut editor, &write_png(dir.path()), Some("Gallery".into()))
            .await
            .unwrap();
        cmd_generate(&mut editor, "edit", "p".into(), None, false, &[])
            .await
            .unwrap();

        let path = dir.path().join(archive_file_name("Gallery"));
        cmd_export(&mut editor, Some(path.clone())).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_end_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryKvStore::new());
        let mut editor = test_editor(store.clone()).await;
        cmd_start(&mut editor, &write_png(dir.path()), Some("S".into()))
            .await
            .unwrap();

        cmd_end(&mut editor).await.unwrap();
        assert!(editor.session().is_none());
        assert!(store
            .get(dragonart_state::SESSION_KEY)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_resolve_config_flags_override_env() {
        let cli = Cli::parse_from([
            "dragonart",
            "--home",
            "/tmp/dragonart-test",
            "--endpoint",
            "http://localhost:3000/api/gemini",
            "status",
        ]);
        let config = resolve_config(&cli);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/dragonart-test"));
        assert_eq!(
            config.endpoint.as_deref(),
            Some("http://localhost:3000/api/gemini")
        );
        assert_eq!(config.guard, GuardConfig::disabled());
    }
}
