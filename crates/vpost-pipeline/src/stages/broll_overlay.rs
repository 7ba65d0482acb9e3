//! Stage 7: b-roll integration into illustrated.mp4.
//!
//! Each clip is pre-normalized (capped length, letterboxed to the canvas,
//! audio stripped) and overlaid full-frame with a time-gated enable. Base
//! audio passes through untouched. With nothing to overlay the trimmed cut
//! is copied verbatim, preserving the contract that illustrated.mp4 always
//! exists.

use serde_json::json;
use tracing::{info, warn};

use vpost_media::filters;
use vpost_media::{get_duration, FfmpegCommand};
use vpost_models::{BrollClip, ProjectId};
use vpost_registry::ProjectRegistry;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

/// Overlays are trimmed to at most this long, seconds.
pub const OVERLAY_CAP_SECS: f64 = 3.0;

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    if !dir.exists(names::NOSILENCE) {
        return Err(PipelineError::missing_input(names::NOSILENCE));
    }

    let clips: Vec<BrollClip> = if dir.exists(names::BROLL_CLIPS) {
        dir.read_json(names::BROLL_CLIPS).await?
    } else {
        Vec::new()
    };

    if clips.is_empty() {
        info!("no b-roll to integrate, copying trimmed cut");
        tokio::fs::copy(dir.path(names::NOSILENCE), dir.path(names::ILLUSTRATED)).await?;
        return record_output(ctx, project_id).await;
    }

    let base_duration = get_duration(dir.path(names::NOSILENCE)).await?;
    let temp = tempfile::tempdir_in(dir.root())?;
    let runner = ctx.runner();

    // Normalize each clip; out-of-range or broken clips are dropped.
    let mut prepared: Vec<(std::path::PathBuf, f64, f64)> = Vec::new();
    for (i, clip) in clips.iter().enumerate() {
        let source = dir.path(&clip.path);
        if !source.exists() {
            warn!(clip = %clip.path, "clip file missing, skipping");
            continue;
        }
        if clip.timestamp < 0.0 || clip.timestamp >= base_duration {
            warn!(timestamp = clip.timestamp, "clip out of range, skipping");
            continue;
        }

        let mut duration = clip.duration.min(OVERLAY_CAP_SECS);
        if clip.timestamp + duration > base_duration {
            duration = base_duration - clip.timestamp;
        }

        let prepared_path = temp.path().join(format!("prepared_{i}.mp4"));
        let cmd = FfmpegCommand::new(&prepared_path)
            .input(&source)
            .limit_duration(duration)
            .video_filter(filters::broll_prepare())
            .no_audio()
            .video_codec("libx264")
            .preset("fast")
            .crf(18);
        if let Err(e) = runner.run(&cmd).await {
            warn!(clip = %clip.path, "clip preparation failed, skipping: {e}");
            continue;
        }

        let actual = get_duration(&prepared_path).await?;
        prepared.push((prepared_path, clip.timestamp, actual));
    }

    if prepared.is_empty() {
        warn!("no usable clips after preparation, copying trimmed cut");
        tokio::fs::copy(dir.path(names::NOSILENCE), dir.path(names::ILLUSTRATED)).await?;
        return record_output(ctx, project_id).await;
    }

    prepared.sort_by(|a, b| a.1.total_cmp(&b.1));

    let windows: Vec<(f64, f64)> = prepared.iter().map(|(_, ts, dur)| (*ts, *dur)).collect();
    let filter = filters::broll_overlay_chain(&windows);

    let mut cmd = FfmpegCommand::new(dir.path(names::ILLUSTRATED)).input(dir.path(names::NOSILENCE));
    for (path, _, _) in &prepared {
        cmd = cmd.input(path);
    }
    let cmd = cmd
        .filter_complex(filter)
        .map("[vout]")
        .map("0:a")
        .video_codec("libx264")
        .preset("fast")
        .crf(18)
        .output_args(["-c:a", "copy"])
        .limit_duration(base_duration);

    runner.run(&cmd).await?;
    info!(clips = prepared.len(), "illustrated.mp4 written");

    record_output(ctx, project_id).await
}

async fn record_output(ctx: &StageContext, project_id: &ProjectId) -> PipelineResult<()> {
    ctx.registry
        .update_fields(
            project_id,
            vec![("outputs.illustrated".to_string(), json!(names::ILLUSTRATED))],
        )
        .await?;
    Ok(())
}
