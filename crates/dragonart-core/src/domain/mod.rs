//! Domain models for DragonArt.
//!
//! Canonical definitions for the core entities:
//! - `Artifact`: one generated image and how it was produced
//! - `ImageData`: encoded image bytes with their MIME type
//! - `EditMode`: the transformation that produced an artifact
//! - `EventLog`: the bounded, numbered user-facing log

pub mod artifact;
pub mod error;
pub mod event_log;
pub mod image;
pub mod mode;

pub use artifact::{
    Artifact, ArtifactId, GenerationMetadata, ImageMetadata, ParentRef, ROOT_SENTINEL,
};
pub use error::{DragonArtError, Result};
pub use event_log::{EventLog, MAX_LOG_ENTRIES};
pub use self::image::ImageData;
pub use mode::{EditMode, UnknownModeError, UNRANKED};
