//! Stage 9: generated thumbnail.
//!
//! A mid-video webcam frame anchors the person; the prompt combines the
//! generated title with random draws from fixed style palettes so
//! consecutive projects do not look cloned. Regeneration keeps the same
//! reference frame and appends the user's corrections to the base prompt.

use chrono::Utc;
use rand::seq::IndexedRandom;
use serde_json::json;
use tracing::{info, warn};

use vpost_media::frame::extract_frame;
use vpost_media::get_duration;
use vpost_models::{ProjectId, SeoFile};
use vpost_registry::ProjectRegistry;
use vpost_services::{ImageGenerator, ImageRequest};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

const FRAME_TEMP: &str = "frame_temp.png";

const COLOR_SCHEMES: [&str; 5] = [
    "electric blue and vivid orange",
    "deep purple and neon green",
    "crimson red and golden yellow",
    "teal and warm coral",
    "midnight blue and bright cyan",
];

const PERSON_POSITIONS: [&str; 4] = [
    "on the left third, facing the text",
    "on the right third, facing the text",
    "slightly left of center, leaning in",
    "slightly right of center, gesturing toward the title",
];

const BACKGROUND_STYLES: [&str; 5] = [
    "blurred code editor with glowing accents",
    "abstract gradient with soft light streaks",
    "dark tech workspace with bokeh lights",
    "clean studio backdrop with a subtle vignette",
    "dynamic diagonal light rays over a dark field",
];

const SITUATIONS: [&str; 4] = [
    "reacting with genuine surprise",
    "mid-explanation with open hands",
    "confidently presenting",
    "pointing at the headline",
];

const CLOTHING: [&str; 4] = [
    "casual hoodie",
    "plain t-shirt",
    "open overshirt over a tee",
    "smart casual shirt",
];

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    run_with_corrections(ctx, project_id, dir, None).await
}

/// Regeneration entry point: `corrections` is appended to the base prompt.
pub async fn run_with_corrections(
    ctx: &StageContext,
    project_id: &ProjectId,
    dir: &ArtifactDir,
    corrections: Option<&str>,
) -> PipelineResult<()> {
    let seo: SeoFile = dir.read_json(names::SEO).await?;

    // The webcam source has the presenter; canvas projects fall back to
    // the composited cut.
    let source = if dir.exists(names::WEBCAM) {
        dir.path(names::WEBCAM)
    } else if dir.exists(names::ORIGINAL) {
        dir.path(names::ORIGINAL)
    } else {
        return Err(PipelineError::missing_input(names::WEBCAM));
    };

    let duration = get_duration(&source).await?;
    extract_frame(&source, dir.path(FRAME_TEMP), duration / 2.0).await?;
    let reference_png = tokio::fs::read(dir.path(FRAME_TEMP)).await?;

    let logo_png = match &ctx.settings.logo_path {
        Some(path) if path.exists() => Some(tokio::fs::read(path).await?),
        _ => None,
    };

    let prompt = {
        let mut rng = rand::rng();
        build_prompt(&seo.main_video.title, corrections, &mut rng)
    };

    let started = std::time::Instant::now();
    let png = ctx
        .services
        .images
        .generate_png(&ImageRequest {
            prompt: prompt.clone(),
            reference_png,
            logo_png,
        })
        .await?;
    dir.write_bytes(names::THUMBNAIL, &png).await?;
    dir.delete(FRAME_TEMP).await.ok();

    // Diagnostic side-file, not an artifact.
    let debug = json!({
        "prompt": prompt,
        "generated_at": Utc::now(),
        "elapsed_ms": started.elapsed().as_millis() as u64,
        "bytes": png.len(),
    });
    if let Err(e) = dir.write_json(names::IMAGE_DEBUG, &debug).await {
        warn!("thumbnail debug file not written: {e}");
    }

    info!(bytes = png.len(), "thumbnail.png written");
    ctx.registry
        .update_fields(
            project_id,
            vec![("outputs.thumbnail".to_string(), json!(names::THUMBNAIL))],
        )
        .await?;
    Ok(())
}

fn build_prompt<R: rand::Rng>(title: &str, corrections: Option<&str>, rng: &mut R) -> String {
    let colors = COLOR_SCHEMES.choose(rng).unwrap_or(&COLOR_SCHEMES[0]);
    let position = PERSON_POSITIONS.choose(rng).unwrap_or(&PERSON_POSITIONS[0]);
    let background = BACKGROUND_STYLES.choose(rng).unwrap_or(&BACKGROUND_STYLES[0]);
    let situation = SITUATIONS.choose(rng).unwrap_or(&SITUATIONS[0]);
    let clothing = CLOTHING.choose(rng).unwrap_or(&CLOTHING[0]);

    let mut prompt = format!(
        "Create a photorealistic 1280x720 video thumbnail.\n\
         - The person from the reference frame, {position}, {situation}, wearing a {clothing}. \
         Keep the face photorealistic, sharp like an f/1.4 portrait, natural lighting.\n\
         - Headline text: \"{title}\" in very large bold uppercase with a thick dark outline, \
         layered BEHIND the person for depth.\n\
         - Background: {background}, heavily blurred with creamy bokeh.\n\
         - Color scheme: {colors}, strong contrast between the sharp foreground and the soft background.\n\
         - If a logo image is provided, place it small in the top-right corner.\n\
         No watermarks, no extra text beyond the headline."
    );
    if let Some(corrections) = corrections {
        prompt.push_str("\n\nAdjustments requested by the user:\n");
        prompt.push_str(corrections);
    }
    prompt
}
