//! Stock-video search and download (Pexels API).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Keyword in → downloadable clip URL out.
#[async_trait]
pub trait StockVideoSearch: Send + Sync {
    /// First hit at a moderate resolution, None when nothing matches.
    async fn find_clip_url(&self, keyword: &str) -> ServiceResult<Option<String>>;

    /// Fetch a clip URL to a local file.
    async fn download(&self, url: &str, dest: &Path) -> ServiceResult<()>;
}

/// Configuration for the stock-video service.
#[derive(Debug, Clone)]
pub struct PexelsClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl PexelsClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self {
            base_url: std::env::var("STOCK_BASE_URL")
                .unwrap_or_else(|_| "https://api.pexels.com".to_string()),
            api_key: std::env::var("STOCK_API_KEY")
                .map_err(|_| ServiceError::config_error("STOCK_API_KEY not set"))?,
            timeout: Duration::from_secs(60),
        })
    }
}

pub struct PexelsClient {
    http: Client,
    config: PexelsClientConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<VideoHit>,
}

#[derive(Debug, Deserialize)]
struct VideoHit {
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize, Clone)]
struct VideoFile {
    #[serde(default)]
    width: Option<u32>,
    link: String,
}

impl PexelsClient {
    pub fn new(config: PexelsClientConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ServiceResult<Self> {
        Self::new(PexelsClientConfig::from_env()?)
    }
}

/// Second-smallest rendition: not the tiny preview, never the 4K master.
fn moderate_rendition(mut files: Vec<VideoFile>) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    files.sort_by_key(|f| f.width.unwrap_or(9999));
    let index = 1.min(files.len() - 1);
    Some(files[index].link.clone())
}

#[async_trait]
impl StockVideoSearch for PexelsClient {
    async fn find_clip_url(&self, keyword: &str) -> ServiceResult<Option<String>> {
        let url = format!("{}/videos/search", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("query", keyword), ("per_page", "3"), ("size", "small")])
            .header("Authorization", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::request_failed(
                "stock-video",
                status.as_u16(),
                body,
            ));
        }

        let search: SearchResponse = response.json().await?;
        let link = search
            .videos
            .into_iter()
            .next()
            .and_then(|hit| moderate_rendition(hit.video_files));

        debug!(keyword, found = link.is_some(), "stock search complete");
        Ok(link)
    }

    async fn download(&self, url: &str, dest: &Path) -> ServiceResult<()> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::request_failed(
                "stock-video",
                status.as_u16(),
                "download failed",
            ));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn rendition_picks_second_smallest() {
        let files = vec![
            VideoFile { width: Some(3840), link: "4k".into() },
            VideoFile { width: Some(640), link: "small".into() },
            VideoFile { width: Some(1280), link: "hd".into() },
        ];
        assert_eq!(moderate_rendition(files), Some("hd".to_string()));

        let single = vec![VideoFile { width: Some(640), link: "only".into() }];
        assert_eq!(moderate_rendition(single), Some("only".to_string()));

        assert_eq!(moderate_rendition(vec![]), None);
    }

    #[tokio::test]
    async fn empty_results_return_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"videos": []})),
            )
            .mount(&server)
            .await;

        let client = PexelsClient::new(PexelsClientConfig {
            base_url: server.uri(),
            api_key: "k".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert!(client.find_clip_url("nothing").await.unwrap().is_none());
    }
}
