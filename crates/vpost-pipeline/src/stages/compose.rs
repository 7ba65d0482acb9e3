//! Stage 1: composition into original.mp4.
//!
//! Classic mode overlays the webcam bubble onto the screen (with optional
//! timed layout switches); canvas mode just re-encodes the
//! browser-composited stream to the same target profile.

use serde_json::json;
use tracing::info;

use vpost_media::filters;
use vpost_media::{get_duration, FfmpegCommand};
use vpost_models::{ProjectId, RecordingConfig};
use vpost_registry::ProjectRegistry;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

/// Target encode profile shared by both modes.
fn target_profile(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.video_codec("libx264")
        .preset("medium")
        .crf(18)
        .output_args(["-profile:v", "high", "-level", "4.1"])
        .audio_codec("aac")
        .audio_bitrate("256k")
        .output_args(["-ar", "48000"])
}

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    let output = dir.path(names::ORIGINAL);
    let runner = ctx.runner();

    // Canvas mode: a pre-composited stream replaces the separate sources.
    if dir.exists(names::COMBINED) {
        info!("canvas mode: re-encoding combined.webm");
        let cmd = target_profile(
            FfmpegCommand::new(&output)
                .input(dir.path(names::COMBINED))
                .video_filter(filters::canvas_rescale()),
        );
        runner.run(&cmd).await?;
    } else {
        if !dir.exists(names::SCREEN) {
            return Err(PipelineError::missing_input(names::SCREEN));
        }
        let config: RecordingConfig = dir.read_json(names::CONFIG).await?;

        if dir.exists(names::WEBCAM) {
            let filter = if config.layout_switches.is_empty() {
                filters::overlay_compose(&config)
            } else {
                let duration = get_duration(dir.path(names::SCREEN)).await?;
                // Switches without a webcam-only interval degrade to the
                // static overlay graph.
                filters::layout_switch_compose(&config, duration)
                    .unwrap_or_else(|| filters::overlay_compose(&config))
            };

            let cmd = target_profile(
                FfmpegCommand::new(&output)
                    .input(dir.path(names::SCREEN))
                    .input(dir.path(names::WEBCAM))
                    .filter_complex(filter)
                    .map("[out]")
                    .map("0:a"),
            )
            .shortest();
            runner.run(&cmd).await?;
        } else {
            // Screen-only project: same profile, no overlay.
            let cmd = target_profile(
                FfmpegCommand::new(&output)
                    .input(dir.path(names::SCREEN))
                    .video_filter(filters::canvas_rescale()),
            );
            runner.run(&cmd).await?;
        }
    }

    let duration = get_duration(&output).await?;
    info!(duration, "original.mp4 written");

    ctx.registry
        .update_fields(
            project_id,
            vec![("outputs.original".to_string(), json!(names::ORIGINAL))],
        )
        .await?;
    Ok(())
}
