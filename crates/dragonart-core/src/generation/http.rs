//! HTTP client for the generation service.
//!
//! Every call is a JSON `POST` to one endpoint carrying a `task` field:
//! - `generateImageFromApi` answers `{ "image": "<data url>" }`
//! - `generateImageMetadata` answers `{ "metadata": { ... } }`
//! - `describeImageForTitle` answers `{ "title": "..." }`
//!
//! Failures answer `{ "message": "..." }` with a non-2xx status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationError, GenerationRequest, ImageGenerator, MetadataDescriber};
use crate::domain::{ImageData, ImageMetadata};

#[derive(Serialize)]
struct TaskRequest<'a, P: Serialize> {
    task: &'a str,
    #[serde(flatten)]
    payload: P,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImagePayload<'a> {
    main_image_base64: String,
    reference_images_base64: Vec<String>,
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    image_base64: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    image: String,
}

#[derive(Deserialize)]
struct MetadataResponse {
    metadata: ImageMetadata,
}

#[derive(Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Generation service client.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpGenerationClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .user_agent(concat!("dragonart/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_task<P, T>(&self, task: &str, payload: P) -> Result<T, GenerationError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        debug!(task = %task, endpoint = %self.endpoint, "posting generation task");
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&TaskRequest { task, payload });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(transport_error);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("{status}: {body}"));
        Err(GenerationError::classify(Some(status.as_u16()), message))
    }
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::RateLimited(format!("request timeout: {err}"))
    } else {
        GenerationError::classify(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

#[async_trait]
impl ImageGenerator for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImageData, GenerationError> {
        let payload = GenerateImagePayload {
            main_image_base64: request.source.to_data_url(),
            reference_images_base64: request
                .references
                .iter()
                .map(ImageData::to_data_url)
                .collect(),
            prompt: &request.prompt,
        };
        let response: ImageResponse = self.post_task("generateImageFromApi", payload).await?;
        ImageData::from_data_url(&response.image)
            .map_err(|e| GenerationError::Unknown(format!("service returned a bad image: {e}")))
    }
}

#[async_trait]
impl MetadataDescriber for HttpGenerationClient {
    async fn describe_image(&self, image: &ImageData) -> Result<ImageMetadata, GenerationError> {
        let payload = ImagePayload {
            image_base64: image.to_data_url(),
        };
        let response: MetadataResponse = self.post_task("generateImageMetadata", payload).await?;
        Ok(response.metadata)
    }

    async fn suggest_title(&self, image: &ImageData) -> Result<String, GenerationError> {
        let payload = ImagePayload {
            image_base64: image.to_data_url(),
        };
        let response: TitleResponse = self.post_task("describeImageForTitle", payload).await?;
        Ok(response.title.trim().replace('"', ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_request_flattens_payload() {
        let req = TaskRequest {
            task: "generateImageFromApi",
            payload: GenerateImagePayload {
                main_image_base64: "data:image/png;base64,AA==".into(),
                reference_images_base64: vec![],
                prompt: "make it red",
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["task"], "generateImageFromApi");
        assert_eq!(json["mainImageBase64"], "data:image/png;base64,AA==");
        assert_eq!(json["referenceImagesBase64"], serde_json::json!([]));
        assert_eq!(json["prompt"], "make it red");
    }

    #[test]
    fn metadata_response_uses_camel_case() {
        let body = r#"{"metadata":{"description":"d","altText":"a","seoKeywords":"k"}}"#;
        let parsed: MetadataResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.metadata.alt_text, "a");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_classified() {
        let client = HttpGenerationClient::new(
            "http://127.0.0.1:9/api",
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        let err = client
            .suggest_title(&ImageData::new("image/png", vec![1]))
            .await
            .unwrap_err();
        assert!(!err.is_permission_denied());
    }
}
