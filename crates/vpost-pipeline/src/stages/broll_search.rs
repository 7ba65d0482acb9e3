//! Stage 6: b-roll discovery.
//!
//! The model proposes insertion points sparingly (talking-head moments,
//! transitions, abstract concepts); each keyword is searched on the stock
//! service and the first moderate-resolution hit is downloaded. Failed
//! items are dropped; an empty plan is a normal outcome for tutorials.

use serde_json::json;
use tracing::{info, warn};

use vpost_models::{BrollClip, BrollSuggestion, Transcription};
use vpost_services::{extract_json_array, CompletionRequest, LanguageModel, StockVideoSearch};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::PipelineResult;

/// Hard cap on one overlay's length, seconds.
pub const MAX_CLIP_SECS: f64 = 4.0;

pub async fn run(ctx: &StageContext, dir: &ArtifactDir) -> PipelineResult<()> {
    let transcription: Transcription = dir.read_json(names::TRANSCRIPTION_JSON).await?;

    let suggestions = suggest_insertions(ctx, &transcription).await;
    if suggestions.is_empty() {
        info!("no b-roll suggested, continuing without");
        dir.write_json(names::BROLL_CLIPS, &Vec::<BrollClip>::new())
            .await?;
        return Ok(());
    }
    dir.write_json(names::BROLL_SUGGESTIONS, &suggestions).await?;

    dir.ensure_subdir(names::BROLL_DIR).await?;
    let mut clips = Vec::new();
    for (i, suggestion) in suggestions.iter().enumerate() {
        if suggestion.keyword.trim().is_empty() {
            continue;
        }
        match download_clip(ctx, dir, i, suggestion).await {
            Ok(Some(clip)) => clips.push(clip),
            Ok(None) => warn!(keyword = %suggestion.keyword, "no stock hit"),
            Err(e) => warn!(keyword = %suggestion.keyword, "clip download dropped: {e}"),
        }
    }

    dir.write_json(names::BROLL_CLIPS, &clips).await?;
    info!(clips = clips.len(), "b-roll clips ready");
    Ok(())
}

async fn suggest_insertions(
    ctx: &StageContext,
    transcription: &Transcription,
) -> Vec<BrollSuggestion> {
    if transcription.segments.is_empty() {
        return Vec::new();
    }

    let prompt = format!(
        "Analyze this transcript and suggest ONLY moments where b-roll footage \
         would genuinely help.\n\n\
         Transcript with timestamps:\n{lines}\n\
         STRICT RULES - do NOT suggest b-roll when:\n\
         - The screen content IS the visual (tutorials, demos, coding)\n\
         - Something is being shown or explained on screen\n\n\
         WHEN to use b-roll:\n\
         - Talking-head moments with nothing on screen\n\
         - Transitions between topics\n\
         - Abstract concepts worth illustrating\n\
         - Introductions and conclusions\n\n\
         QUANTITY: at most {max} suggestions; an empty list [] is a fine answer.\n\n\
         For each moment give:\n\
         1. keyword: an ENGLISH stock-video search keyword\n\
         2. timestamp: insertion point in seconds\n\
         3. duration: clip length, 2-{max_len:.0} seconds MAX\n\
         4. description: why this b-roll helps\n\n\
         Reply with valid JSON (may be empty []):\n\
         [\n  {{\"keyword\": \"cloud computing\", \"timestamp\": 15.0, \"duration\": 3, \"description\": \"...\"}}\n]",
        lines = transcription.timestamped_lines(),
        max = ctx.settings.max_broll_clips,
        max_len = MAX_CLIP_SECS,
    );

    let response = match ctx.services.llm.complete(&CompletionRequest::new(prompt)).await {
        Ok(r) => r,
        Err(e) => {
            warn!("b-roll suggestions unavailable: {e}");
            return Vec::new();
        }
    };

    extract_json_array(&response)
        .and_then(|array| serde_json::from_str::<Vec<BrollSuggestion>>(array).ok())
        .unwrap_or_else(|| {
            warn!("b-roll suggestions failed to parse");
            Vec::new()
        })
}

async fn download_clip(
    ctx: &StageContext,
    dir: &ArtifactDir,
    index: usize,
    suggestion: &BrollSuggestion,
) -> PipelineResult<Option<BrollClip>> {
    let Some(url) = ctx.services.stock.find_clip_url(&suggestion.keyword).await? else {
        return Ok(None);
    };

    let rel_path = format!(
        "{}/clip_{index}_{}.mp4",
        names::BROLL_DIR,
        suggestion.keyword.replace(' ', "_")
    );
    ctx.services.stock.download(&url, &dir.path(&rel_path)).await?;
    let clip_size_mb = dir.file_size(&rel_path).await? / (1024 * 1024);
    info!(file = %rel_path, size_mb = clip_size_mb, "clip downloaded");

    Ok(Some(BrollClip {
        path: rel_path,
        keyword: suggestion.keyword.clone(),
        timestamp: suggestion.timestamp,
        duration: suggestion.duration.min(MAX_CLIP_SECS),
        description: suggestion.description.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json as j;

    #[test]
    fn suggestion_parsing_matches_model_shape() {
        let raw = j!([
            {"keyword": "cloud computing", "timestamp": 15.0, "duration": 3, "description": "abstract"},
        ])
        .to_string();
        let parsed: Vec<BrollSuggestion> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0].keyword, "cloud computing");
        assert_eq!(parsed[0].duration, 3.0);
    }
}
