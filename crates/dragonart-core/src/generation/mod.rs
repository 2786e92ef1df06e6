//! Contracts for the remote generation and description collaborators.
//!
//! The core never talks to a model directly. It hands a [`GenerationRequest`]
//! to an [`ImageGenerator`] and classifies what comes back into
//! [`GenerationError`], which drives the retry policy and the user notices.

pub mod fakes;
pub mod http;

use async_trait::async_trait;

use crate::domain::{ImageData, ImageMetadata};

pub use http::HttpGenerationClient;

/// Classified collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Rate limit, overload or timeout. Worth retrying.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Credentials rejected. Needs reconfiguration.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The model refused to produce an image.
    #[error("blocked: {0}")]
    Filtered(String),

    #[error("{0}")]
    Unknown(String),
}

impl GenerationError {
    /// Classify a failure from an optional HTTP status and its message.
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let rate_limited = matches!(status, Some(429 | 503 | 504))
            || mentions_code(&lower, "429")
            || mentions_code(&lower, "503")
            || ["rate limit", "overloaded", "deadline exceeded", "timeout"]
                .iter()
                .any(|needle| lower.contains(needle));
        if rate_limited {
            return Self::RateLimited(message);
        }

        if status == Some(403)
            || mentions_code(&lower, "403")
            || lower.contains("permission denied")
        {
            return Self::PermissionDenied(message);
        }

        if lower.contains("safety filter") || lower.contains("model response:") {
            return Self::Filtered(message);
        }

        Self::Unknown(message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::RateLimited(m)
            | Self::PermissionDenied(m)
            | Self::Filtered(m)
            | Self::Unknown(m) => m,
        }
    }
}

/// Whether `code` appears in `message` as a standalone number.
fn mentions_code(message: &str, code: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == code)
}

/// One image generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source: ImageData,
    pub references: Vec<ImageData>,
    pub prompt: String,
}

/// Produces a new image from a source image and an instruction.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageData, GenerationError>;
}

/// Describes images: structured metadata and session title suggestions.
#[async_trait]
pub trait MetadataDescriber: Send + Sync {
    async fn describe_image(&self, image: &ImageData) -> Result<ImageMetadata, GenerationError>;

    async fn suggest_title(&self, image: &ImageData) -> Result<String, GenerationError>;
}

/// Stand-in used when no generation endpoint is configured. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

const UNCONFIGURED: &str = "no generation endpoint configured";

#[async_trait]
impl ImageGenerator for Unconfigured {
    async fn generate(&self, _request: &GenerationRequest) -> Result<ImageData, GenerationError> {
        Err(GenerationError::Unknown(UNCONFIGURED.into()))
    }
}

#[async_trait]
impl MetadataDescriber for Unconfigured {
    async fn describe_image(&self, _image: &ImageData) -> Result<ImageMetadata, GenerationError> {
        Err(GenerationError::Unknown(UNCONFIGURED.into()))
    }

    async fn suggest_title(&self, _image: &ImageData) -> Result<String, GenerationError> {
        Err(GenerationError::Unknown(UNCONFIGURED.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limits() {
        assert!(GenerationError::classify(Some(429), "slow down").is_retryable());
        assert!(GenerationError::classify(None, "Model is OVERLOADED").is_retryable());
        assert!(GenerationError::classify(None, "Deadline exceeded").is_retryable());
        assert!(GenerationError::classify(Some(500), "upstream 503").is_retryable());
        assert!(GenerationError::classify(None, "[429 Too Many Requests]").is_retryable());
    }

    #[test]
    fn embedded_digits_are_not_status_codes() {
        let err =
            GenerationError::classify(Some(500), "request req_84290 failed after 15030 bytes");
        assert!(!err.is_retryable());
        assert!(!err.is_permission_denied());
        assert!(!GenerationError::classify(None, "payload 4403 rejected").is_permission_denied());
        assert!(matches!(
            GenerationError::classify(None, "bad input 1503x"),
            GenerationError::Unknown(_)
        ));
    }

    #[test]
    fn classify_permission() {
        let err = GenerationError::classify(Some(403), "nope");
        assert!(err.is_permission_denied());
        assert!(!err.is_retryable());
        assert!(
            GenerationError::classify(None, "Permission denied for key").is_permission_denied()
        );
    }

    #[test]
    fn classify_filtered_and_unknown() {
        assert!(matches!(
            GenerationError::classify(None, "Safety filter blocked the image generation."),
            GenerationError::Filtered(_)
        ));
        assert!(matches!(
            GenerationError::classify(None, "Model Response: I cannot draw that"),
            GenerationError::Filtered(_)
        ));
        let err = GenerationError::classify(Some(500), "boom");
        assert_eq!(err, GenerationError::Unknown("boom".into()));
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn unconfigured_collaborator_always_fails() {
        let image = ImageData::new("image/png", vec![1]);
        let err = Unconfigured.suggest_title(&image).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("endpoint"));
    }
}
