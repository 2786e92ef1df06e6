//! Domain-level error taxonomy for DragonArt.

use crate::domain::mode::EditMode;
use crate::generation::GenerationError;

/// DragonArt domain errors.
#[derive(Debug, thiserror::Error)]
pub enum DragonArtError {
    #[error("no active session")]
    NoActiveSession,

    #[error("no step is selected")]
    NoSelection,

    #[error("a generation is already in progress")]
    GenerationInProgress,

    #[error("need at least {required} steps in history, have {available}")]
    NotEnoughHistory { required: usize, available: usize },

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("step {step} is out of range (history has {len} steps)")]
    StepOutOfRange { step: usize, len: usize },

    #[error("mode {0} does not produce images for history")]
    UnsupportedMode(EditMode),

    #[error("invalid image data: {0}")]
    InvalidImage(String),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("storage error: {0}")]
    Storage(#[from] dragonart_state::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("export error: {0}")]
    Export(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DragonArtError {
    fn from(err: zip::result::ZipError) -> Self {
        DragonArtError::Export(err.to_string())
    }
}

/// Result type for DragonArt domain operations.
pub type Result<T> = std::result::Result<T, DragonArtError>;
