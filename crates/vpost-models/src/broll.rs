//! B-roll insertion points and downloaded clips.

use serde::{Deserialize, Serialize};

/// One insertion point proposed by the language model
/// (broll_suggestions.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrollSuggestion {
    /// English search keyword for the stock-video service
    pub keyword: String,
    /// Insertion timestamp on the trimmed timeline, seconds
    pub timestamp: f64,
    /// Requested clip duration, seconds (capped downstream)
    pub duration: f64,
    #[serde(default)]
    pub description: String,
}

/// A downloaded clip ready for overlay (broll_clips.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrollClip {
    /// Path relative to the artifact directory (broll/clip_*.mp4)
    pub path: String,
    pub keyword: String,
    pub timestamp: f64,
    pub duration: f64,
    #[serde(default)]
    pub description: String,
}
