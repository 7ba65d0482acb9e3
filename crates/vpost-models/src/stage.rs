//! Pipeline stages and chain construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Total number of steps used for coarse progress (stage 0 through 11).
pub const TOTAL_STEPS: u32 = 12;

/// The twelve pipeline stages, in execution order.
///
/// Stages 0..=10 form the automatic pipeline; `Publish` is always submitted
/// separately after human approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 0: re-encode raw uploads to uniform 60 fps sources
    Normalize,
    /// Stage 1: composite screen + webcam into original.mp4
    Compose,
    /// Stage 2: cut silences out of original.mp4
    SilenceTrim,
    /// Stage 3: apply the same cuts to the separate sources
    SourceTrim,
    /// Stage 4: speech-to-text over nosilence.mp4
    Transcribe,
    /// Stage 5: vertical shorts with karaoke captions
    Shorts,
    /// Stage 6: find and download b-roll clips
    BrollSearch,
    /// Stage 7: overlay b-roll onto the trimmed cut
    BrollOverlay,
    /// Stage 8: titles, descriptions, tags
    Seo,
    /// Stage 9: generated thumbnail image
    Thumbnail,
    /// Stage 10: publication schedule + blob-store mirror
    Schedule,
    /// Stage 11: upload to the video host (user-gated)
    Publish,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 12] = [
        Stage::Normalize,
        Stage::Compose,
        Stage::SilenceTrim,
        Stage::SourceTrim,
        Stage::Transcribe,
        Stage::Shorts,
        Stage::BrollSearch,
        Stage::BrollOverlay,
        Stage::Seo,
        Stage::Thumbnail,
        Stage::Schedule,
        Stage::Publish,
    ];

    /// Zero-based position in the pipeline.
    pub fn index(self) -> u8 {
        Stage::ALL.iter().position(|s| *s == self).unwrap_or(0) as u8
    }

    /// Stage for a zero-based index.
    pub fn from_index(index: u8) -> Option<Stage> {
        Stage::ALL.get(index as usize).copied()
    }

    /// Stable snake_case name used in queue payloads and the steps map.
    pub fn wire_name(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Compose => "compose",
            Stage::SilenceTrim => "silence_trim",
            Stage::SourceTrim => "source_trim",
            Stage::Transcribe => "transcribe",
            Stage::Shorts => "shorts",
            Stage::BrollSearch => "broll_search",
            Stage::BrollOverlay => "broll_overlay",
            Stage::Seo => "seo",
            Stage::Thumbnail => "thumbnail",
            Stage::Schedule => "schedule",
            Stage::Publish => "publish",
        }
    }

    /// Human-readable label shown as the project's `step_name`.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Normalize => "Converting to 60 fps",
            Stage::Compose => "Compositing sources",
            Stage::SilenceTrim => "Removing silences",
            Stage::SourceTrim => "Cutting sources",
            Stage::Transcribe => "Transcribing",
            Stage::Shorts => "Generating shorts",
            Stage::BrollSearch => "Downloading b-roll",
            Stage::BrollOverlay => "Integrating b-roll",
            Stage::Seo => "Generating metadata",
            Stage::Thumbnail => "Generating thumbnail",
            Stage::Schedule => "Scheduling uploads",
            Stage::Publish => "Uploading",
        }
    }

    /// Build the ordered chain `[start..=end]`.
    ///
    /// Returns an empty chain when `start > end`.
    pub fn chain(start: Stage, end: Stage) -> Vec<Stage> {
        let (a, b) = (start.index() as usize, end.index() as usize);
        if a > b {
            return Vec::new();
        }
        Stage::ALL[a..=b].to_vec()
    }

    /// The publication stage is never part of an automatic chain.
    pub fn is_publication(self) -> bool {
        matches!(self, Stage::Publish)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .find(|stage| stage.wire_name() == s)
            .copied()
            .ok_or_else(|| format!("unknown stage: {s}"))
    }
}
