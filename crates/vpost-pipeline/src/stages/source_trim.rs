//! Stage 3: apply the stage-2 cuts to the separate sources.
//!
//! Shorts re-composite the trimmed screen and webcam into vertical layouts;
//! cutting both with the exact segment list keeps them frame-aligned with
//! nosilence.mp4. A missing segments.json is a hard failure: re-detecting
//! here could drift from the trimmed cut.

use tracing::info;

use vpost_media::cut::cut_with_segments;
use vpost_models::SegmentsFile;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

pub async fn run(ctx: &StageContext, dir: &ArtifactDir) -> PipelineResult<()> {
    // Canvas mode has no separate sources to trim.
    if dir.exists(names::COMBINED) && !dir.exists(names::SCREEN) {
        info!("canvas mode: no separate sources to cut");
        return Ok(());
    }

    if !dir.exists(names::SCREEN) {
        return Err(PipelineError::missing_input(names::SCREEN));
    }
    let segments_file: SegmentsFile = dir.read_json(names::SEGMENTS).await?;
    let segments = &segments_file.segments;
    info!(segments = segments.len(), "cutting sources with stage-2 segments");

    let runner = ctx.runner();

    cut_with_segments(
        dir.path(names::SCREEN),
        dir.path(names::SCREEN_NOSILENCE),
        segments,
        true,
        &runner,
    )
    .await?;
    info!("screennosilence.mp4 written");

    if dir.exists(names::WEBCAM) {
        cut_with_segments(
            dir.path(names::WEBCAM),
            dir.path(names::WEBCAM_NOSILENCE),
            segments,
            false,
            &runner,
        )
        .await?;
        info!("webcamnosilence.mp4 written");
    } else {
        info!("no webcam.mp4, skipping");
    }

    Ok(())
}
