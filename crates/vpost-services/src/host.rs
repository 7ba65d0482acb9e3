//! Video-host publication client.
//!
//! The host is reduced to its typed contract: file + metadata + optional
//! publish_at in, `{id, url, status}` out. The REST implementation talks to
//! a configured uploader endpoint that owns the host-side OAuth session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use vpost_models::Privacy;

use crate::error::{ServiceError, ServiceResult};

/// One publication request.
#[derive(Debug, Clone)]
pub struct UploadVideoRequest {
    pub file_path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: Privacy,
    /// RFC3339; when set, the host keeps the video private until then
    pub publish_at: Option<String>,
    pub is_short: bool,
}

/// Host-side record of an uploaded video.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedVideo {
    pub id: String,
    pub url: String,
    pub status: String,
}

/// Publication capability.
#[async_trait]
pub trait VideoHost: Send + Sync {
    async fn upload_video(&self, request: &UploadVideoRequest) -> ServiceResult<HostedVideo>;

    async fn set_thumbnail(&self, video_id: &str, image_path: &Path) -> ServiceResult<()>;
}

/// Configuration for the uploader endpoint.
#[derive(Debug, Clone)]
pub struct UploaderClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl UploaderClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self {
            base_url: std::env::var("VIDEO_HOST_URL")
                .map_err(|_| ServiceError::config_error("VIDEO_HOST_URL not set"))?,
            api_key: std::env::var("VIDEO_HOST_API_KEY")
                .map_err(|_| ServiceError::config_error("VIDEO_HOST_API_KEY not set"))?,
            // Uploads of long videos take a while
            timeout: Duration::from_secs(
                std::env::var("VIDEO_HOST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
        })
    }
}

pub struct UploaderClient {
    http: Client,
    config: UploaderClientConfig,
}

impl UploaderClient {
    pub fn new(config: UploaderClientConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ServiceResult<Self> {
        Self::new(UploaderClientConfig::from_env()?)
    }
}

fn privacy_str(privacy: Privacy) -> &'static str {
    match privacy {
        Privacy::Public => "public",
        Privacy::Unlisted => "unlisted",
        Privacy::Private => "private",
    }
}

#[async_trait]
impl VideoHost for UploaderClient {
    async fn upload_video(&self, request: &UploadVideoRequest) -> ServiceResult<HostedVideo> {
        let url = format!("{}/videos", self.config.base_url);
        let bytes = tokio::fs::read(&request.file_path).await?;
        let file_name = request
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let mut form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("video/mp4")
                    .map_err(ServiceError::Network)?,
            )
            .text("title", request.title.clone())
            .text("description", request.description.clone())
            .text("tags", request.tags.join(","))
            .text("privacy", privacy_str(request.privacy))
            .text("is_short", request.is_short.to_string());
        if let Some(publish_at) = &request.publish_at {
            form = form.text("publish_at", publish_at.clone());
        }

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
                "video-host",
                status.as_u16(),
                body,
            ));
        }

        let hosted: HostedVideo = response.json().await?;
        info!(video_id = %hosted.id, title = %request.title, "video uploaded");
        Ok(hosted)
    }

    async fn set_thumbnail(&self, video_id: &str, image_path: &Path) -> ServiceResult<()> {
        let url = format!("{}/videos/{}/thumbnail", self.config.base_url, video_id);
        let bytes = tokio::fs::read(image_path).await?;

        let form = Form::new().part(
            "file",
            Part::bytes(bytes)
                .file_name("thumbnail.png")
                .mime_str("image/png")
                .map_err(ServiceError::Network)?,
        );

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
                "video-host",
                status.as_u16(),
                body,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn upload_parses_host_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc123",
                "url": "https://host/watch?v=abc123",
                "status": "uploaded"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.mp4");
        std::fs::write(&file, b"fake-video").unwrap();

        let client = UploaderClient::new(UploaderClientConfig {
            base_url: server.uri(),
            api_key: "k".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let hosted = client
            .upload_video(&UploadVideoRequest {
                file_path: file,
                title: "t".to_string(),
                description: String::new(),
                tags: vec!["a".to_string()],
                privacy: Privacy::Private,
                publish_at: Some("2026-08-04T18:00:00Z".to_string()),
                is_short: true,
            })
            .await
            .unwrap();
        assert_eq!(hosted.id, "abc123");
        assert_eq!(hosted.status, "uploaded");
    }
}
