//! Speech-to-text client (Whisper-compatible API).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use vpost_models::{TranscriptSegment, Transcription};

use crate::error::{ServiceError, ServiceResult};

/// Audio file in → timestamped transcript out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> ServiceResult<Transcription>;
}

/// Configuration for the Whisper-compatible endpoint.
#[derive(Debug, Clone)]
pub struct WhisperClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl WhisperClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self {
            base_url: std::env::var("STT_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            api_key: std::env::var("STT_API_KEY")
                .map_err(|_| ServiceError::config_error("STT_API_KEY not set"))?,
            model: std::env::var("STT_MODEL")
                .unwrap_or_else(|_| "whisper-large-v3".to_string()),
            timeout: Duration::from_secs(
                std::env::var("STT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        })
    }
}

/// Multipart client for `audio/transcriptions` with verbose timestamps.
pub struct WhisperClient {
    http: Client,
    config: WhisperClientConfig,
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
    #[serde(default)]
    language: String,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperClient {
    pub fn new(config: WhisperClientConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ServiceResult<Self> {
        Self::new(WhisperClientConfig::from_env()?)
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> ServiceResult<Transcription> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        debug!(file = %file_name, size = bytes.len(), "submitting transcription");

        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/mpeg")
                    .map_err(ServiceError::Network)?,
            )
            .text("model", self.config.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::request_failed(
                "speech-to-text",
                status.as_u16(),
                body,
            ));
        }

        let verbose: VerboseTranscription = response.json().await?;
        Ok(Transcription {
            text: verbose.text,
            segments: verbose
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
            language: if verbose.language.is_empty() {
                language.to_string()
            } else {
                verbose.language
            },
            duration: verbose.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_verbose_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "segments": [
                    {"id": 0, "seek": 0, "start": 0.0, "end": 1.5, "text": " hello"},
                    {"id": 1, "seek": 0, "start": 1.5, "end": 3.0, "text": " world"}
                ],
                "language": "en",
                "duration": 3.0
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.mp3");
        std::fs::write(&audio, b"fake-mp3").unwrap();

        let client = WhisperClient::new(WhisperClientConfig {
            base_url: server.uri(),
            api_key: "k".to_string(),
            model: "whisper-large-v3".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let t = client.transcribe(&audio, "en").await.unwrap();
        assert_eq!(t.text, "hello world");
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[1].end, 3.0);
        assert_eq!(t.language, "en");
    }
}
