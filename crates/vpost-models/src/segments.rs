//! Kept-segment document produced by the silence-trim stage (segments.json).

use serde::{Deserialize, Serialize};

/// A half-open interval on the source timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// The single source of truth for where the talking happened.
///
/// Written by the silence-trim stage before its encode is declared complete;
/// the source-trim stage applies exactly these intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentsFile {
    /// Kept (speech) intervals with absolute timestamps on original.mp4
    pub segments: Vec<TimeSpan>,
    /// Detected silences
    pub silences: Vec<TimeSpan>,
    pub original_duration: f64,
    pub threshold_db: i32,
    pub min_silence: f64,
    pub padding: f64,
}

impl SegmentsFile {
    /// Total kept duration in seconds.
    pub fn kept_duration(&self) -> f64 {
        self.segments.iter().map(TimeSpan::duration).sum()
    }

    /// Percentage of the source removed, rounded like the progress field.
    pub fn reduction_percent(&self) -> u32 {
        if self.original_duration <= 0.0 {
            return 0;
        }
        let ratio = 1.0 - self.kept_duration() / self.original_duration;
        (ratio * 100.0).round().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_zero_silence() {
        let file = SegmentsFile {
            segments: vec![TimeSpan::new(0.0, 30.0)],
            silences: vec![],
            original_duration: 30.0,
            threshold_db: -30,
            min_silence: 1.0,
            padding: 0.1,
        };
        assert_eq!(file.reduction_percent(), 0);
        assert!((file.kept_duration() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn reduction_half_cut() {
        let file = SegmentsFile {
            segments: vec![TimeSpan::new(0.0, 15.0)],
            silences: vec![TimeSpan::new(15.0, 30.0)],
            original_duration: 30.0,
            threshold_db: -30,
            min_silence: 1.0,
            padding: 0.1,
        };
        assert_eq!(file.reduction_percent(), 50);
    }
}
