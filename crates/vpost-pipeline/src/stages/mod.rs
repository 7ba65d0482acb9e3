//! The stage library.
//!
//! Every stage consumes declared inputs from the artifact directory and
//! overwrites only its declared outputs, so re-running against existing
//! files is safe. Registry bookkeeping (step begin/complete/fail) is the
//! worker's responsibility via `vpost_registry::ProjectRegistry`; bodies
//! only touch registry fields that belong to their contract (output
//! manifest entries, the stage-10/11 status transitions).

pub mod broll_overlay;
pub mod broll_search;
pub mod compose;
pub mod normalize;
pub mod publish;
pub mod schedule;
pub mod seo;
pub mod shorts;
pub mod silence_trim;
pub mod source_trim;
pub mod thumbnail;
pub mod transcribe;

use vpost_models::{ProjectId, Stage};

use crate::artifact::ArtifactDir;
use crate::context::StageContext;
use crate::error::PipelineResult;

/// Run one stage body against a project's artifact directory.
pub async fn run_stage(
    ctx: &StageContext,
    project_id: &ProjectId,
    dir: &ArtifactDir,
    stage: Stage,
) -> PipelineResult<()> {
    match stage {
        Stage::Normalize => normalize::run(ctx, dir).await,
        Stage::Compose => compose::run(ctx, project_id, dir).await,
        Stage::SilenceTrim => silence_trim::run(ctx, project_id, dir).await,
        Stage::SourceTrim => source_trim::run(ctx, dir).await,
        Stage::Transcribe => transcribe::run(ctx, dir).await,
        Stage::Shorts => shorts::run(ctx, project_id, dir).await,
        Stage::BrollSearch => broll_search::run(ctx, dir).await,
        Stage::BrollOverlay => broll_overlay::run(ctx, project_id, dir).await,
        Stage::Seo => seo::run(ctx, project_id, dir).await,
        Stage::Thumbnail => thumbnail::run(ctx, project_id, dir).await,
        Stage::Schedule => schedule::run(ctx, project_id, dir).await,
        Stage::Publish => publish::run(ctx, project_id, dir).await,
    }
}
