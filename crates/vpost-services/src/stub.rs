//! Canned-response doubles for stage-body tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use vpost_models::Transcription;

use crate::error::{ServiceError, ServiceResult};
use crate::host::{HostedVideo, UploadVideoRequest, VideoHost};
use crate::imagegen::{ImageGenerator, ImageRequest};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::stock::StockVideoSearch;
use crate::transcribe::SpeechToText;

/// Returns a fixed transcript for any audio file.
pub struct StubSpeechToText {
    pub transcription: Transcription,
}

#[async_trait]
impl SpeechToText for StubSpeechToText {
    async fn transcribe(&self, _audio_path: &Path, _language: &str) -> ServiceResult<Transcription> {
        Ok(self.transcription.clone())
    }
}

/// Plays back a queue of canned completions, then errors.
#[derive(Default)]
pub struct StubLanguageModel {
    responses: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubLanguageModel {
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for StubLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String> {
        self.prompts
            .lock()
            .expect("stub lock")
            .push(request.prompt.clone());
        self.responses
            .lock()
            .expect("stub lock")
            .pop_front()
            .ok_or_else(|| ServiceError::malformed("llm", "stub exhausted"))
    }
}

/// Always finds (or never finds) a clip; downloads write fixed bytes.
pub struct StubStockVideo {
    pub url: Option<String>,
    pub clip_bytes: Vec<u8>,
}

impl Default for StubStockVideo {
    fn default() -> Self {
        Self {
            url: Some("https://stock.example/clip.mp4".to_string()),
            clip_bytes: b"stub-clip".to_vec(),
        }
    }
}

#[async_trait]
impl StockVideoSearch for StubStockVideo {
    async fn find_clip_url(&self, _keyword: &str) -> ServiceResult<Option<String>> {
        Ok(self.url.clone())
    }

    async fn download(&self, _url: &str, dest: &Path) -> ServiceResult<()> {
        tokio::fs::write(dest, &self.clip_bytes).await?;
        Ok(())
    }
}

/// Records uploads; optionally fails titles matching a marker.
#[derive(Default)]
pub struct StubVideoHost {
    pub uploads: Mutex<Vec<UploadVideoRequest>>,
    pub thumbnails: Mutex<Vec<String>>,
    /// Uploads whose title contains this marker fail
    pub fail_marker: Option<String>,
}

#[async_trait]
impl VideoHost for StubVideoHost {
    async fn upload_video(&self, request: &UploadVideoRequest) -> ServiceResult<HostedVideo> {
        if let Some(marker) = &self.fail_marker {
            if request.title.contains(marker.as_str()) {
                return Err(ServiceError::request_failed("video-host", 500, "stub failure"));
            }
        }
        let mut uploads = self.uploads.lock().expect("stub lock");
        uploads.push(request.clone());
        let id = format!("vid-{}", uploads.len());
        Ok(HostedVideo {
            url: format!("https://host.example/watch?v={id}"),
            id,
            status: "uploaded".to_string(),
        })
    }

    async fn set_thumbnail(&self, video_id: &str, _image_path: &Path) -> ServiceResult<()> {
        self.thumbnails
            .lock()
            .expect("stub lock")
            .push(video_id.to_string());
        Ok(())
    }
}

/// Returns fixed PNG bytes.
pub struct StubImageGenerator {
    pub png: Vec<u8>,
}

impl Default for StubImageGenerator {
    fn default() -> Self {
        // Minimal PNG signature so downstream size checks pass
        Self {
            png: vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a],
        }
    }
}

#[async_trait]
impl ImageGenerator for StubImageGenerator {
    async fn generate_png(&self, _request: &ImageRequest) -> ServiceResult<Vec<u8>> {
        Ok(self.png.clone())
    }
}
