//! DragonArt Core Library
//!
//! The session history model behind an iterative AI image editor: a tree of
//! generated artifacts addressed by parent reference, tree repair on
//! deletion, persistence under a byte budget, and export.

pub mod config;
pub mod domain;
pub mod editor;
pub mod export;
pub mod generation;
pub mod history;
pub mod metrics;
pub mod navigation;
pub mod obs;
pub mod persistence;
pub mod retry;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::EditorConfig;
pub use domain::{
    Artifact, ArtifactId, DragonArtError, EditMode, EventLog, GenerationMetadata, ImageData,
    ImageMetadata, ParentRef, Result,
};
pub use editor::{Editor, GenerationOptions, GenerationTicket, GenerationWorker, Notice};
pub use export::{plan_export, ExportEntry, ExportPlan};
pub use generation::{
    GenerationError, GenerationRequest, HttpGenerationClient, ImageGenerator, MetadataDescriber,
    Unconfigured,
};
pub use history::{delete_oldest, delete_one, DeleteReport, PruneReport, DEFAULT_PRUNE_COUNT};
pub use navigation::{Cursor, Direction};
pub use persistence::{LoadOutcome, SaveOutcome, SessionPersister, SkipReason};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use session::{Favorites, Session};
pub use store::ArtifactStore;

pub use dragonart_state::{FsKvStore, KvStore, MemoryKvStore, StorageError};
