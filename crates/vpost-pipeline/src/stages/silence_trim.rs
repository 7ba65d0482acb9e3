//! Stage 2: silence removal.
//!
//! segments.json is written before the encode starts: it is the single
//! source of truth for every later "where did the talking happen" question,
//! and must survive even if the encode is interrupted.

use tracing::{info, warn};

use vpost_media::cut::cut_with_segments;
use vpost_media::silence::{detect_silences, silences_to_spans, speech_segments, SilenceParams};
use vpost_media::get_duration;
use vpost_models::{ProjectId, SegmentsFile, TimeSpan};
use vpost_registry::ProjectRegistry;

use serde_json::json;

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    if !dir.exists(names::ORIGINAL) {
        return Err(PipelineError::missing_input(names::ORIGINAL));
    }
    let input = dir.path(names::ORIGINAL);
    let params = SilenceParams::default();

    let duration = get_duration(&input).await?;
    let silences = detect_silences(&input, &params).await?;
    info!(count = silences.len(), "silences detected");

    let mut segments = speech_segments(&silences, duration, &params);
    if segments.is_empty() {
        // Nothing but silence detected; keeping the whole clip beats
        // emitting an empty cut.
        warn!("no speech segments found, keeping the full clip");
        segments = vec![TimeSpan::new(0.0, duration)];
    }

    let segments_file = SegmentsFile {
        segments: segments.clone(),
        silences: silences_to_spans(&silences, duration),
        original_duration: duration,
        threshold_db: params.threshold_db,
        min_silence: params.min_silence,
        padding: params.padding,
    };
    dir.write_json(names::SEGMENTS, &segments_file).await?;

    cut_with_segments(
        &input,
        dir.path(names::NOSILENCE),
        &segments,
        true,
        &ctx.runner(),
    )
    .await?;

    let final_duration = get_duration(dir.path(names::NOSILENCE)).await?;
    info!(
        segments = segments.len(),
        final_duration,
        reduction = segments_file.reduction_percent(),
        "nosilence.mp4 written"
    );

    ctx.registry
        .update_fields(
            project_id,
            vec![("outputs.nosilence".to_string(), json!(names::NOSILENCE))],
        )
        .await?;
    Ok(())
}
