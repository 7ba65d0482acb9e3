//! Short candidate windows (shorts_suggestions.json).

use serde::{Deserialize, Serialize};

/// One candidate window proposed by the language model.
///
/// Timestamps are on the silence-trimmed timeline. The shorts stage snaps
/// them to transcript segment boundaries before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortSuggestion {
    pub title: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub description: String,
}

impl ShortSuggestion {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}
