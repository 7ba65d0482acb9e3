//! Execution context handed to stage bodies.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use vpost_media::FfmpegRunner;
use vpost_registry::ProjectRegistry;
use vpost_services::{ImageGenerator, LanguageModel, SpeechToText, StockVideoSearch, VideoHost};
use vpost_storage::BlobStore;

use crate::schedule_policy::SchedulePolicy;

/// The external capabilities stage bodies call.
#[derive(Clone)]
pub struct Services {
    pub speech: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub stock: Arc<dyn StockVideoSearch>,
    pub host: Arc<dyn VideoHost>,
    pub images: Arc<dyn ImageGenerator>,
}

/// Tunables and fixed assets.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Candidate windows requested from the model
    pub max_shorts: usize,
    /// B-roll insertion points requested from the model
    pub max_broll_clips: usize,
    /// Transcription language hint
    pub language: String,
    /// Sign-off block appended to main-video descriptions
    pub signature: String,
    /// Shorter sign-off for shorts
    pub signature_short: String,
    /// Proper nouns the transcript correction must not rewrite
    pub glossary: Vec<String>,
    /// Common outro appended to every short, when present
    pub outro_path: Option<PathBuf>,
    /// Brand logo handed to the thumbnail generator, when present
    pub logo_path: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_shorts: 3,
            max_broll_clips: 3,
            language: "en".to_string(),
            signature: "\n\n--\nSubscribe for more!".to_string(),
            signature_short: "\n\nSubscribe for more!".to_string(),
            glossary: [
                "GitHub", "API", "FFmpeg", "Python", "JavaScript", "TypeScript", "React",
                "VS Code", "Rust",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            outro_path: None,
            logo_path: None,
        }
    }
}

impl PipelineSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_shorts: std::env::var("PIPELINE_MAX_SHORTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_shorts),
            max_broll_clips: std::env::var("PIPELINE_MAX_BROLL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_broll_clips),
            language: std::env::var("PIPELINE_LANGUAGE").unwrap_or(defaults.language),
            signature: std::env::var("SEO_SIGNATURE").unwrap_or(defaults.signature),
            signature_short: std::env::var("SEO_SIGNATURE_SHORT")
                .unwrap_or(defaults.signature_short),
            glossary: std::env::var("TRANSCRIPT_GLOSSARY")
                .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.glossary),
            outro_path: std::env::var("ASSETS_OUTRO").ok().map(PathBuf::from),
            logo_path: std::env::var("ASSETS_LOGO").ok().map(PathBuf::from),
        }
    }
}

/// Everything a stage body needs beyond the artifact directory.
#[derive(Clone)]
pub struct StageContext {
    pub registry: Arc<dyn ProjectRegistry>,
    pub services: Services,
    /// Long-term mirror; absent deployments skip mirroring
    pub blob_store: Option<Arc<BlobStore>>,
    pub settings: PipelineSettings,
    pub schedule_policy: SchedulePolicy,
    /// Flips to true when the chain is revoked; encoder runs watch it
    pub cancel_rx: Option<watch::Receiver<bool>>,
}

impl StageContext {
    /// An encoder runner wired to this chain's cancellation signal.
    pub fn runner(&self) -> FfmpegRunner {
        match &self.cancel_rx {
            Some(rx) => FfmpegRunner::new().with_cancel(rx.clone()),
            None => FfmpegRunner::new(),
        }
    }
}
