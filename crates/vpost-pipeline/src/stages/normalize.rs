//! Stage 0: raw upload normalization.
//!
//! Re-encodes the browser captures to constant 60 fps progressive MP4 with
//! the moov atom up front, so every later stage can assume a uniform,
//! seekable source. Raw inputs are deleted once both outputs exist.

use tracing::info;

use vpost_media::FfmpegCommand;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

pub async fn run(ctx: &StageContext, dir: &ArtifactDir) -> PipelineResult<()> {
    let screen_raw = dir.find_with_prefix(names::SCREEN_RAW_PREFIX).await?;
    let webcam_raw = dir.find_with_prefix(names::WEBCAM_RAW_PREFIX).await?;

    let Some(screen_raw) = screen_raw else {
        // Already normalized (or canvas-composited): nothing left to do.
        if dir.exists(names::SCREEN) || dir.exists(names::COMBINED) {
            info!("no raw inputs; sources already normalized");
            return Ok(());
        }
        return Err(PipelineError::missing_input("screen_raw.*"));
    };

    let runner = ctx.runner();

    // Screen keeps its audio track.
    let screen_cmd = FfmpegCommand::new(dir.path(names::SCREEN))
        .input(&screen_raw)
        .output_args(["-r", "60", "-vsync", "cfr"])
        .video_codec("libx264")
        .preset("fast")
        .crf(18)
        .audio_codec("aac")
        .audio_bitrate("192k")
        .faststart();
    runner.run(&screen_cmd).await?;
    let screen_size_mb = dir.file_size(names::SCREEN).await? / (1024 * 1024);
    info!(size_mb = screen_size_mb, "screen.mp4 written");

    // Webcam is video-only; its audio is a duplicate of the screen track.
    if let Some(webcam_raw) = &webcam_raw {
        let webcam_cmd = FfmpegCommand::new(dir.path(names::WEBCAM))
            .input(webcam_raw)
            .output_args(["-r", "60", "-vsync", "cfr"])
            .video_codec("libx264")
            .preset("fast")
            .crf(18)
            .no_audio()
            .faststart();
        runner.run(&webcam_cmd).await?;
        let webcam_size_mb = dir.file_size(names::WEBCAM).await? / (1024 * 1024);
        info!(size_mb = webcam_size_mb, "webcam.mp4 written");
    }

    tokio::fs::remove_file(&screen_raw).await.ok();
    if let Some(webcam_raw) = webcam_raw {
        tokio::fs::remove_file(webcam_raw).await.ok();
    }
    info!("raw inputs deleted");

    Ok(())
}
