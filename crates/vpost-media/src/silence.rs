//! Silence detection and kept-segment arithmetic.
//!
//! Detection shells out to FFmpeg's `silencedetect` audio filter and parses
//! its stderr. The complement computation is pure so the invariant "padded
//! kept segments cover everything outside the silences" stays testable
//! without media files.

use std::path::Path;
use std::process::Stdio;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use vpost_models::TimeSpan;

use crate::error::{MediaError, MediaResult};

/// Detection and trimming parameters.
#[derive(Debug, Clone, Copy)]
pub struct SilenceParams {
    /// Noise floor in dB below which audio counts as silence
    pub threshold_db: i32,
    /// Minimum silence duration to cut, seconds
    pub min_silence: f64,
    /// Padding kept on each side of a speech segment, seconds
    pub padding: f64,
    /// Kept segments closer than this after padding are merged, seconds
    pub merge_gap: f64,
}

impl Default for SilenceParams {
    fn default() -> Self {
        Self {
            threshold_db: -30,
            min_silence: 1.0,
            padding: 0.1,
            merge_gap: 0.5,
        }
    }
}

/// A detected silence; `end` is None when the stream ended mid-silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSilence {
    pub start: f64,
    pub end: Option<f64>,
}

/// Run silencedetect over a file.
pub async fn detect_silences(
    path: impl AsRef<Path>,
    params: &SilenceParams,
) -> MediaResult<Vec<RawSilence>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let filter = format!(
        "silencedetect=noise={}dB:d={}",
        params.threshold_db, params.min_silence
    );

    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-i"])
        .arg(path)
        .args(["-af", &filter, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    // silencedetect reports on stderr even on success; a failed decode
    // still exits non-zero.
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "silencedetect pass failed",
            Some(&stderr),
            output.status.code(),
        ));
    }

    let silences = parse_silencedetect(&stderr);
    debug!(
        path = %path.display(),
        count = silences.len(),
        "silence detection complete"
    );
    Ok(silences)
}

/// Parse `silence_start` / `silence_end` pairs from FFmpeg stderr.
pub fn parse_silencedetect(stderr: &str) -> Vec<RawSilence> {
    let start_re = Regex::new(r"silence_start: ([\d.]+)").expect("valid regex");
    let end_re = Regex::new(r"silence_end: ([\d.]+)").expect("valid regex");

    let mut silences: Vec<RawSilence> = Vec::new();
    for line in stderr.lines() {
        if let Some(cap) = start_re.captures(line) {
            if let Ok(start) = cap[1].parse::<f64>() {
                silences.push(RawSilence { start, end: None });
            }
        } else if let Some(cap) = end_re.captures(line) {
            if let Ok(end) = cap[1].parse::<f64>() {
                if let Some(last) = silences.last_mut() {
                    if last.end.is_none() {
                        last.end = Some(end);
                    }
                }
            }
        }
    }
    silences
}

/// Clamp raw silences into closed spans for segments.json.
pub fn silences_to_spans(silences: &[RawSilence], total_duration: f64) -> Vec<TimeSpan> {
    silences
        .iter()
        .map(|s| TimeSpan::new(s.start, s.end.unwrap_or(total_duration)))
        .collect()
}

/// Compute the kept (speech) segments as the padded complement of the
/// silences, merging segments whose post-padding gap is under `merge_gap`.
///
/// Kept slivers shorter than 0.1 s are dropped.
pub fn speech_segments(
    silences: &[RawSilence],
    total_duration: f64,
    params: &SilenceParams,
) -> Vec<TimeSpan> {
    let padding = params.padding;
    let mut segments: Vec<TimeSpan> = Vec::new();
    let mut last_end = 0.0_f64;

    for s in silences {
        let seg_start = if last_end > 0.0 {
            (last_end - padding).max(0.0)
        } else {
            last_end
        };
        let seg_end = (s.start + padding).min(total_duration);
        if seg_end > seg_start + 0.1 {
            segments.push(TimeSpan::new(seg_start, seg_end));
        }
        last_end = s.end.unwrap_or(s.start);
    }

    if last_end < total_duration {
        segments.push(TimeSpan::new((last_end - padding).max(0.0), total_duration));
    }

    // Merge neighbours that padding brought closer than the gap.
    let mut merged: Vec<TimeSpan> = Vec::new();
    for seg in segments {
        match merged.last_mut() {
            Some(prev) if seg.start - prev.end < params.merge_gap => prev.end = seg.end,
            _ => merged.push(seg),
        }
    }
    merged
}
