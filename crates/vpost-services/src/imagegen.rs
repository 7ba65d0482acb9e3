//! Image-generation client for thumbnails.
//!
//! Prompt + reference frame (and optionally a logo) in, PNG bytes out.
//! Uses an OpenAI-compatible chat endpoint with an image-capable model;
//! images travel as base64 data URLs both ways.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// One thumbnail generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// Reference frame (PNG) the person is lifted from
    pub reference_png: Vec<u8>,
    /// Optional brand logo to place on the result
    pub logo_png: Option<Vec<u8>>,
}

/// Image-generation capability.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_png(&self, request: &ImageRequest) -> ServiceResult<Vec<u8>>;
}

/// Configuration for the image endpoint.
#[derive(Debug, Clone)]
pub struct ImageGenClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ImageGenClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self {
            base_url: std::env::var("IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            api_key: std::env::var("IMAGE_API_KEY")
                .or_else(|_| std::env::var("LLM_API_KEY"))
                .map_err(|_| ServiceError::config_error("IMAGE_API_KEY not set"))?,
            model: std::env::var("IMAGE_MODEL")
                .unwrap_or_else(|_| "google/gemini-2.5-flash-image".to_string()),
            timeout: Duration::from_secs(180),
        })
    }
}

pub struct ImageGenClient {
    http: Client,
    config: ImageGenClientConfig,
}

#[derive(Debug, Deserialize)]
struct ImageChatResponse {
    choices: Vec<ImageChoice>,
}

#[derive(Debug, Deserialize)]
struct ImageChoice {
    message: ImageMessage,
}

#[derive(Debug, Deserialize)]
struct ImageMessage {
    #[serde(default)]
    images: Vec<ImagePart>,
}

#[derive(Debug, Deserialize)]
struct ImagePart {
    image_url: ImageUrl,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    url: String,
}

impl ImageGenClient {
    pub fn new(config: ImageGenClientConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ServiceResult<Self> {
        Self::new(ImageGenClientConfig::from_env()?)
    }
}

fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Decode `data:image/...;base64,<payload>` into raw bytes.
fn decode_data_url(url: &str) -> ServiceResult<Vec<u8>> {
    let payload = url
        .split_once("base64,")
        .map(|(_, p)| p)
        .ok_or_else(|| ServiceError::malformed("image-gen", "image url is not a data url"))?;
    BASE64
        .decode(payload)
        .map_err(|e| ServiceError::malformed("image-gen", e.to_string()))
}

#[async_trait]
impl ImageGenerator for ImageGenClient {
    async fn generate_png(&self, request: &ImageRequest) -> ServiceResult<Vec<u8>> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut content = vec![
            json!({"type": "text", "text": request.prompt}),
            json!({"type": "image_url", "image_url": {"url": data_url(&request.reference_png)}}),
        ];
        if let Some(logo) = &request.logo_png {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": data_url(logo)}
            }));
        }

        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": content}],
            "modalities": ["image", "text"],
        });

        debug!(model = %self.config.model, "requesting thumbnail generation");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::request_failed(
                "image-gen",
                status.as_u16(),
                body,
            ));
        }

        let parsed: ImageChatResponse = response.json().await?;
        let image_url = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.images.into_iter().next())
            .map(|i| i.image_url.url)
            .ok_or_else(|| ServiceError::malformed("image-gen", "no image in response"))?;

        decode_data_url(&image_url)
    }
}
