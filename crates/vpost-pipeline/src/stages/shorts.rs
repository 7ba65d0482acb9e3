//! Stage 5: vertical shorts with karaoke captions.
//!
//! Candidate windows come from the language model, get snapped to
//! transcript segment boundaries so no short cuts mid-phrase, and are
//! rejected when the snapped duration leaves no room for the outro under
//! the host's 30-second ceiling. Individual render failures drop that
//! short; producing zero shorts is a valid success.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{info, warn};

use vpost_media::filters;
use vpost_media::fs_utils::move_file;
use vpost_media::subtitles::build_karaoke_ass;
use vpost_media::FfmpegCommand;
use vpost_models::{ProjectId, ShortSuggestion, TranscriptSegment, Transcription};
use vpost_registry::ProjectRegistry;
use vpost_services::{extract_json_array, CompletionRequest, LanguageModel};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::PipelineResult;

/// Shortest renderable clip.
pub const MIN_CONTENT_SECS: f64 = 3.0;
/// The appended outro runs this long.
pub const OUTRO_SECS: f64 = 4.0;
/// Host-side ceiling for a short, outro included.
pub const MAX_TOTAL_SECS: f64 = 30.0;
/// Content ceiling leaving room for the outro.
pub const MAX_CONTENT_SECS: f64 = MAX_TOTAL_SECS - OUTRO_SECS;

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    let transcription: Transcription = dir.read_json(names::TRANSCRIPTION_JSON).await?;

    // Prefer the trimmed sources; fall back to the normalized ones.
    let screen = pick_source(dir, names::SCREEN_NOSILENCE, names::SCREEN);
    let webcam = pick_source(dir, names::WEBCAM_NOSILENCE, names::WEBCAM);
    let (Some(screen), Some(webcam)) = (screen, webcam) else {
        // Canvas-composited projects have no separate sources.
        info!("separate sources unavailable, completing with zero shorts");
        dir.write_json(names::SHORTS_SUGGESTIONS, &Vec::<ShortSuggestion>::new())
            .await?;
        return record_outputs(ctx, project_id, Vec::new()).await;
    };

    let proposed = suggest_windows(ctx, &transcription).await;
    let accepted = snap_and_filter(&proposed, &transcription.segments);
    dir.write_json(names::SHORTS_SUGGESTIONS, &accepted).await?;
    info!(
        proposed = proposed.len(),
        accepted = accepted.len(),
        "short windows selected"
    );

    if accepted.is_empty() {
        return record_outputs(ctx, project_id, Vec::new()).await;
    }

    dir.ensure_subdir(names::SHORTS_DIR).await?;
    let mut produced = Vec::new();
    for (index, suggestion) in accepted.iter().enumerate() {
        match render_short(ctx, dir, &screen, &webcam, &transcription.segments, index, suggestion)
            .await
        {
            Ok(rel_path) => produced.push(rel_path),
            Err(e) => warn!(index, "short render failed: {e}"),
        }
    }

    info!(count = produced.len(), "shorts rendered");
    record_outputs(ctx, project_id, produced).await
}

async fn record_outputs(
    ctx: &StageContext,
    project_id: &ProjectId,
    shorts: Vec<String>,
) -> PipelineResult<()> {
    ctx.registry
        .update_fields(project_id, vec![("outputs.shorts".to_string(), json!(shorts))])
        .await?;
    Ok(())
}

fn pick_source(dir: &ArtifactDir, preferred: &str, fallback: &str) -> Option<PathBuf> {
    if dir.exists(preferred) {
        Some(dir.path(preferred))
    } else if dir.exists(fallback) {
        Some(dir.path(fallback))
    } else {
        None
    }
}

/// Ask the model for candidate windows. Any failure yields an empty list;
/// a video too short for shorts is not an error.
async fn suggest_windows(ctx: &StageContext, transcription: &Transcription) -> Vec<ShortSuggestion> {
    if transcription.segments.is_empty() {
        return Vec::new();
    }

    let prompt = format!(
        "Analyze this video transcript and suggest up to {max} engaging moments \
         for vertical shorts (15-{max_len:.0} seconds each).\n\n\
         Transcript with timestamps:\n{lines}\n\
         Total duration: {duration:.1}s\n\n\
         For each short give:\n\
         1. A catchy title (max 50 characters)\n\
         2. The start timestamp in seconds - MUST be the START of a sentence\n\
         3. The end timestamp in seconds - MUST be the END of a sentence\n\
         4. A brief description\n\n\
         Reply with valid JSON in exactly this shape:\n\
         [\n  {{\"title\": \"...\", \"start\": 0.0, \"end\": 26.0, \"description\": \"...\"}}\n]\n\n\
         CRITICAL RULES:\n\
         - NEVER cut mid-sentence; use EXACTLY the segment timestamps above\n\
         - Each short must run between 15 and {max_len:.0} seconds MAXIMUM \
           (a {outro:.0}s outro is appended)\n\
         - Pick the most engaging moments with natural starts and endings",
        max = ctx.settings.max_shorts,
        max_len = MAX_CONTENT_SECS,
        outro = OUTRO_SECS,
        lines = transcription.timestamped_lines(),
        duration = transcription.duration,
    );

    let response = match ctx.services.llm.complete(&CompletionRequest::new(prompt)).await {
        Ok(r) => r,
        Err(e) => {
            warn!("short suggestions unavailable: {e}");
            return Vec::new();
        }
    };

    let Some(array) = extract_json_array(&response) else {
        warn!("short suggestions had no JSON array");
        return Vec::new();
    };
    match serde_json::from_str::<Vec<ShortSuggestion>>(array) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!("short suggestions failed to parse: {e}");
            Vec::new()
        }
    }
}

/// Snap a window to the nearest segment boundaries.
///
/// Start snaps to the closest segment start, end to the closest segment
/// end. A window that collapses gets a 15-second floor from its start.
pub fn snap_to_segments(start: f64, end: f64, segments: &[TranscriptSegment]) -> (f64, f64) {
    if segments.is_empty() {
        return (start, end);
    }

    let best_start = segments
        .iter()
        .map(|s| s.start)
        .min_by(|a, b| (a - start).abs().total_cmp(&(b - start).abs()))
        .unwrap_or(start);
    let best_end = segments
        .iter()
        .map(|s| s.end)
        .min_by(|a, b| (a - end).abs().total_cmp(&(b - end).abs()))
        .unwrap_or(end);

    if best_end <= best_start {
        (best_start, best_start + 15.0)
    } else {
        (best_start, best_end)
    }
}

/// Snap every proposal and keep those within the duration bounds.
pub fn snap_and_filter(
    proposed: &[ShortSuggestion],
    segments: &[TranscriptSegment],
) -> Vec<ShortSuggestion> {
    let mut accepted = Vec::new();
    for suggestion in proposed {
        let (start, end) = snap_to_segments(suggestion.start, suggestion.end, segments);
        let duration = end - start;
        if !(MIN_CONTENT_SECS..=MAX_CONTENT_SECS).contains(&duration) {
            continue;
        }
        let mut title = suggestion.title.clone();
        if !title.to_lowercase().contains("#shorts") {
            title = format!("{title} #shorts");
        }
        accepted.push(ShortSuggestion {
            title,
            start,
            end,
            description: suggestion.description.clone(),
        });
    }
    accepted
}

/// Filesystem-safe slice of a title.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .take(30)
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

async fn render_short(
    ctx: &StageContext,
    dir: &ArtifactDir,
    screen: &Path,
    webcam: &Path,
    segments: &[TranscriptSegment],
    index: usize,
    suggestion: &ShortSuggestion,
) -> PipelineResult<String> {
    let rel_path = format!(
        "{}/short_{:02}_{}.mp4",
        names::SHORTS_DIR,
        index + 1,
        sanitize_title(&suggestion.title)
    );
    info!(
        start = suggestion.start,
        end = suggestion.end,
        file = %rel_path,
        "rendering short"
    );

    // Burned karaoke captions need an on-disk ASS file.
    let ass_rel = format!("{}/temp_{index}.ass", names::SHORTS_DIR);
    let ass_path = if segments.is_empty() {
        None
    } else {
        let ass = build_karaoke_ass(segments, suggestion.start, suggestion.end);
        dir.write_string(&ass_rel, &ass).await?;
        Some(dir.path(&ass_rel))
    };

    let filter = filters::shorts_stack(
        suggestion.start,
        suggestion.end,
        ass_path.as_ref().and_then(|p| p.to_str()),
    );

    let cmd = FfmpegCommand::new(dir.path(&rel_path))
        .input(screen)
        .input(webcam)
        .filter_complex(filter)
        .map("[out]")
        .map("[audio]")
        .video_codec("libx264")
        .preset("fast")
        .crf(18)
        .audio_codec("aac")
        .audio_bitrate("192k")
        .faststart();

    let result = ctx.runner().run(&cmd).await;
    dir.delete(&ass_rel).await.ok();
    result?;

    if let Some(outro) = &ctx.settings.outro_path {
        if outro.exists() {
            if let Err(e) = append_outro(ctx, dir, &rel_path, outro).await {
                warn!("outro not appended, keeping short without it: {e}");
            }
        }
    }

    Ok(rel_path)
}

/// Re-encode the outro to the short canvas, then concat with stream copy.
async fn append_outro(
    ctx: &StageContext,
    dir: &ArtifactDir,
    short_rel: &str,
    outro: &Path,
) -> PipelineResult<()> {
    let outro_rel = format!("{}/outro_temp.mp4", names::SHORTS_DIR);
    let concat_rel = format!("{}/concat_outro.txt", names::SHORTS_DIR);
    let final_rel = format!("{short_rel}.with_outro.mp4");

    let reencode = FfmpegCommand::new(dir.path(&outro_rel))
        .input(outro)
        .video_filter(filters::outro_letterbox())
        .video_codec("libx264")
        .preset("fast")
        .crf(18)
        .audio_codec("aac")
        .audio_bitrate("192k")
        .output_args(["-ar", "44100", "-r", "30"]);
    ctx.runner().run(&reencode).await?;

    let list = format!(
        "file '{}'\nfile '{}'\n",
        dir.path(short_rel).display(),
        dir.path(&outro_rel).display()
    );
    dir.write_string(&concat_rel, &list).await?;

    let concat = FfmpegCommand::new(dir.path(&final_rel))
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .input(dir.path(&concat_rel))
        .output_args(["-c", "copy"]);
    let result = ctx.runner().run(&concat).await;

    dir.delete(&concat_rel).await.ok();
    dir.delete(&outro_rel).await.ok();
    result?;

    move_file(dir.path(&final_rel), dir.path(short_rel)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: "words".to_string(),
        }
    }

    fn suggestion(start: f64, end: f64) -> ShortSuggestion {
        ShortSuggestion {
            title: "Big moment".to_string(),
            start,
            end,
            description: String::new(),
        }
    }

    #[test]
    fn snapping_picks_nearest_boundaries() {
        let segments = vec![seg(0.0, 7.12), seg(7.12, 19.4), seg(19.4, 31.05), seg(31.05, 60.0)];
        // Proposed 7.3..45.8: nearest start is 7.12, nearest end is 31.05
        // (|45.8-31.05| = 14.75 beats |45.8-60.0| = 14.2? no: 14.2 < 14.75)
        let (start, end) = snap_to_segments(7.3, 45.8, &segments);
        assert_eq!(start, 7.12);
        // 60.0 is actually closer to 45.8 than 31.05; verify the math holds
        assert_eq!(end, 60.0);
    }

    #[test]
    fn snapped_window_inside_bounds_is_accepted() {
        let segments = vec![seg(7.12, 20.0), seg(20.0, 31.05)];
        let accepted = snap_and_filter(&[suggestion(7.3, 30.8)], &segments);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].start, 7.12);
        assert_eq!(accepted[0].end, 31.05);
        let duration = accepted[0].end - accepted[0].start;
        assert!((duration - 23.93).abs() < 1e-9);
        assert!(accepted[0].title.contains("#shorts"));
    }

    #[test]
    fn oversized_window_is_rejected_silently() {
        let segments = vec![seg(0.0, 10.0), seg(10.0, 50.0)];
        // Snaps to (0.0, 50.0): 50s > 26s content ceiling
        let accepted = snap_and_filter(&[suggestion(0.2, 49.0)], &segments);
        assert!(accepted.is_empty());
    }

    #[test]
    fn undersized_window_is_rejected() {
        let segments = vec![seg(0.0, 1.0), seg(1.0, 2.0)];
        let accepted = snap_and_filter(&[suggestion(0.0, 1.9)], &segments);
        assert!(accepted.is_empty());
    }

    #[test]
    fn collapsed_window_gets_fifteen_second_floor() {
        // Snapping can invert a window when its endpoints sit near
        // different segments; the floor keeps end past start.
        let segments = vec![seg(0.0, 2.0), seg(20.0, 30.0)];
        let (start, end) = snap_to_segments(19.0, 1.5, &segments);
        assert_eq!(start, 20.0);
        assert_eq!(end, 35.0);
    }

    #[test]
    fn existing_marker_is_not_duplicated() {
        let segments = vec![seg(0.0, 20.0)];
        let mut s = suggestion(0.0, 20.0);
        s.title = "Already tagged #shorts".to_string();
        let accepted = snap_and_filter(&[s], &segments);
        assert_eq!(accepted[0].title, "Already tagged #shorts");
    }

    #[test]
    fn sanitized_titles_are_path_safe() {
        assert_eq!(sanitize_title("Big reveal! #shorts"), "Big_reveal_shorts");
        assert_eq!(sanitize_title("a/b\\c:d"), "abcd");
        assert!(sanitize_title(&"x".repeat(100)).len() <= 30);
    }
}
