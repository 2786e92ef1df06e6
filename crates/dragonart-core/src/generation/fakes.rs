//! In-memory collaborator fakes for tests and offline use.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationError, GenerationRequest, ImageGenerator, MetadataDescriber};
use crate::domain::{ImageData, ImageMetadata};

/// Generator that replays a queue of scripted outcomes.
///
/// Once the script runs out it echoes the request's source image.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<ImageData, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(
        outcomes: impl IntoIterator<Item = Result<ImageData, GenerationError>>,
    ) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: Result<ImageData, GenerationError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageData, GenerationError> {
        self.requests
            .lock()
            .map_err(|_| GenerationError::Unknown("scripted generator poisoned".into()))?
            .push(request.clone());
        let next = self
            .script
            .lock()
            .map_err(|_| GenerationError::Unknown("scripted generator poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| Ok(request.source.clone()))
    }
}

/// Describer returning fixed answers and counting calls.
pub struct StaticDescriber {
    metadata: ImageMetadata,
    title: String,
    calls: Mutex<usize>,
}

impl StaticDescriber {
    pub fn new(metadata: ImageMetadata, title: impl Into<String>) -> Self {
        Self {
            metadata,
            title: title.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn describe_calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }
}

impl Default for StaticDescriber {
    fn default() -> Self {
        Self::new(
            ImageMetadata {
                description: "A small green dragon".into(),
                alt_text: "Dragon".into(),
                seo_keywords: "dragon, green".into(),
            },
            "Little Green Dragon",
        )
    }
}

#[async_trait]
impl MetadataDescriber for StaticDescriber {
    async fn describe_image(&self, _image: &ImageData) -> Result<ImageMetadata, GenerationError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        Ok(self.metadata.clone())
    }

    async fn suggest_title(&self, _image: &ImageData) -> Result<String, GenerationError> {
        Ok(self.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(tag: u8) -> ImageData {
        ImageData::new("image/png", vec![tag])
    }

    #[tokio::test]
    async fn scripted_outcomes_then_echo() {
        let gen = ScriptedGenerator::with_outcomes(vec![
            Err(GenerationError::RateLimited("429".into())),
            Ok(img(9)),
        ]);
        let req = GenerationRequest {
            source: img(1),
            references: vec![],
            prompt: "p".into(),
        };
        assert!(gen.generate(&req).await.unwrap_err().is_retryable());
        assert_eq!(gen.generate(&req).await.unwrap(), img(9));
        assert_eq!(gen.generate(&req).await.unwrap(), img(1));
        assert_eq!(gen.requests().len(), 3);
    }
}
