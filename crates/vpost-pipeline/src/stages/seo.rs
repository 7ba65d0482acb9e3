//! Stage 8: metadata generation (seo.json).
//!
//! Every field comes from one structured-JSON model call. A response that
//! fails to parse is retried once, then replaced by a hard-coded skeleton;
//! the pipeline never stalls on a chatty model.

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use vpost_models::{MainVideoSeo, ProjectId, SeoFile, ShortSeo, ShortSuggestion, Transcription};
use vpost_registry::ProjectRegistry;
use vpost_services::{strip_code_fences, CompletionRequest, LanguageModel};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::PipelineResult;

pub async fn run(ctx: &StageContext, project_id: &ProjectId, dir: &ArtifactDir) -> PipelineResult<()> {
    let transcription = load_transcription(dir).await?;
    info!(chars = transcription.text.len(), "generating metadata");

    let main_video = main_video_seo(ctx, &transcription).await;
    info!(title = %main_video.title, tags = main_video.tags.len(), "main video metadata ready");

    let mut shorts = Vec::new();
    let short_files = dir.list(names::SHORTS_DIR, "mp4").await?;
    if !short_files.is_empty() {
        let suggestions: Vec<ShortSuggestion> = if dir.exists(names::SHORTS_SUGGESTIONS) {
            dir.read_json(names::SHORTS_SUGGESTIONS).await?
        } else {
            Vec::new()
        };

        for (i, file) in short_files.iter().enumerate() {
            let (start, end) = suggestions
                .get(i)
                .map(|s| (s.start, s.end))
                .unwrap_or(((i * 30) as f64, (i * 30 + 30) as f64));

            let mut seo = short_seo(ctx, &transcription, i, start, end).await;
            seo.file = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            seo.start = start;
            seo.end = end;
            info!(index = i, title = %seo.title, "short metadata ready");
            shorts.push(seo);
        }
    }

    let seo_file = SeoFile { main_video, shorts };
    dir.write_json(names::SEO, &seo_file).await?;

    ctx.registry
        .update_fields(project_id, vec![("outputs.seo".to_string(), json!(names::SEO))])
        .await?;
    Ok(())
}

/// transcription.json, or the plain-text fallback when only it survived.
async fn load_transcription(dir: &ArtifactDir) -> PipelineResult<Transcription> {
    if dir.exists(names::TRANSCRIPTION_JSON) {
        return dir.read_json(names::TRANSCRIPTION_JSON).await;
    }
    let text = dir.read_to_string(names::TRANSCRIPTION_TXT).await?;
    Ok(Transcription {
        text,
        segments: Vec::new(),
        language: String::new(),
        duration: 30.0,
    })
}

async fn main_video_seo(ctx: &StageContext, transcription: &Transcription) -> MainVideoSeo {
    let excerpt: String = transcription.text.chars().take(3000).collect();
    let prompt = format!(
        "You are a video SEO expert. Generate optimal metadata for this video.\n\n\
         VIDEO TRANSCRIPT:\n{excerpt}\n\n\
         DURATION: {duration:.0} seconds\n\n\
         Reply with VALID JSON in exactly this structure:\n\
         {{\n\
         \"title\": \"Catchy title, 50-70 characters, emoji first\",\n\
         \"description\": \"200-400 word description: summary, key points, call to action. \
         Do NOT include links, they are appended automatically.\",\n\
         \"tags\": [\"tag1\", \"tag2\"],\n\
         \"category\": \"Education or Science & Technology or Howto & Style\",\n\
         \"pinned_comment\": \"Engaging pinned comment ending with a question\"\n\
         }}\n\n\
         Rules: 15-25 tags mixing popular and specific; reply with ONLY the JSON.",
        duration = transcription.duration,
    );

    match structured::<MainVideoSeo>(ctx.services.llm.as_ref(), prompt, 1500).await {
        Some(mut seo) => {
            seo.description.push_str(&ctx.settings.signature);
            seo
        }
        None => {
            warn!("main video metadata fell back to skeleton");
            MainVideoSeo::skeleton(&ctx.settings.signature)
        }
    }
}

async fn short_seo(
    ctx: &StageContext,
    transcription: &Transcription,
    index: usize,
    start: f64,
    end: f64,
) -> ShortSeo {
    let scoped = transcription.text_between(start, end, 5.0);
    let excerpt: String = if scoped.is_empty() {
        transcription.text.chars().take(500).collect()
    } else {
        scoped
    };

    let prompt = format!(
        "You are a shorts SEO expert. Generate metadata for short #{n}.\n\n\
         TRANSCRIPT EXCERPT:\n{excerpt}\n\n\
         DURATION: {duration:.0} seconds\n\n\
         Reply with VALID JSON in exactly this structure:\n\
         {{\n\
         \"title\": \"Very short punchy title, max 40 characters, emoji first\",\n\
         \"description\": \"1-2 sentences with a simple call to action. No links.\",\n\
         \"hashtags\": [\"#tag1\", \"#tag2\", \"#shorts\"],\n\
         \"pinned_comment\": \"Short engaging question\"\n\
         }}\n\n\
         Rules: 5-8 hashtags, ALWAYS include #shorts; reply with ONLY the JSON.",
        n = index + 1,
        duration = end - start,
    );

    let mut seo = match structured(ctx.services.llm.as_ref(), prompt, 500).await {
        Some(seo) => seo,
        None => {
            warn!(index, "short metadata fell back to skeleton");
            ShortSeo::skeleton(index, &ctx.settings.signature_short)
        }
    };
    seo.ensure_shorts_marker();
    if !seo.description.ends_with(&ctx.settings.signature_short) {
        seo.description.push_str(&ctx.settings.signature_short);
    }
    seo
}

/// One structured call with a single retry on parse or transport failure.
async fn structured<T: DeserializeOwned>(
    llm: &dyn LanguageModel,
    prompt: String,
    max_tokens: u32,
) -> Option<T> {
    for attempt in 0..2 {
        let request = CompletionRequest::new(prompt.clone()).with_max_tokens(max_tokens);
        match llm.complete(&request).await {
            Ok(response) => match serde_json::from_str::<T>(strip_code_fences(&response)) {
                Ok(value) => return Some(value),
                Err(e) => warn!(attempt, "structured response failed to parse: {e}"),
            },
            Err(e) => warn!(attempt, "structured call failed: {e}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{project_fixture, test_context};
    use std::sync::Arc;
    use vpost_models::TranscriptSegment;
    use vpost_services::StubLanguageModel;

    fn transcription() -> Transcription {
        Transcription {
            text: "we ship the feature and talk about it".to_string(),
            segments: vec![TranscriptSegment {
                start: 0.0,
                end: 20.0,
                text: "we ship the feature and talk about it".to_string(),
            }],
            language: "en".to_string(),
            duration: 20.0,
        }
    }

    #[tokio::test]
    async fn parse_failure_twice_falls_back_to_skeleton() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_json(names::TRANSCRIPTION_JSON, &transcription())
            .await
            .unwrap();

        let mut ctx = test_context(registry);
        ctx.services.llm = Arc::new(StubLanguageModel::with_responses([
            "not json at all",
            "still not json",
        ]));

        run(&ctx, &id, &dir).await.unwrap();

        let seo: SeoFile = dir.read_json(names::SEO).await.unwrap();
        assert_eq!(seo.main_video.title, "Untitled video");
        assert!(seo.main_video.description.contains("Subscribe"));
        assert!(seo.shorts.is_empty());
    }

    #[tokio::test]
    async fn retry_recovers_from_one_bad_response() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_json(names::TRANSCRIPTION_JSON, &transcription())
            .await
            .unwrap();

        let mut ctx = test_context(registry);
        ctx.services.llm = Arc::new(StubLanguageModel::with_responses([
            "oops",
            r#"```json
{"title": "Shipping it", "description": "We ship.", "tags": ["dev"], "category": "Education", "pinned_comment": "Thoughts?"}
```"#,
        ]));

        run(&ctx, &id, &dir).await.unwrap();

        let seo: SeoFile = dir.read_json(names::SEO).await.unwrap();
        assert_eq!(seo.main_video.title, "Shipping it");
        assert!(seo.main_video.description.starts_with("We ship."));
        assert!(seo.main_video.description.ends_with("Subscribe for more!"));
    }

    #[tokio::test]
    async fn shorts_get_scoped_metadata_with_marker() {
        let (_tmp, dir, registry, id) = project_fixture("video_x").await;
        dir.write_json(names::TRANSCRIPTION_JSON, &transcription())
            .await
            .unwrap();
        dir.ensure_subdir(names::SHORTS_DIR).await.unwrap();
        dir.write_bytes("shorts/short_01_demo.mp4", b"v").await.unwrap();
        dir.write_json(
            names::SHORTS_SUGGESTIONS,
            &vec![ShortSuggestion {
                title: "demo".to_string(),
                start: 0.0,
                end: 20.0,
                description: String::new(),
            }],
        )
        .await
        .unwrap();

        let mut ctx = test_context(registry);
        ctx.services.llm = Arc::new(StubLanguageModel::with_responses([
            // main video
            r#"{"title": "T", "description": "D", "tags": [], "category": "Education", "pinned_comment": "?"}"#,
            // short
            r##"{"title": "Clip", "description": "Watch", "hashtags": ["#dev"], "pinned_comment": "?"}"##,
        ]));

        run(&ctx, &id, &dir).await.unwrap();

        let seo: SeoFile = dir.read_json(names::SEO).await.unwrap();
        assert_eq!(seo.shorts.len(), 1);
        let short = &seo.shorts[0];
        assert_eq!(short.file, "short_01_demo.mp4");
        assert_eq!(short.title, "Clip #shorts");
        assert!(short.hashtags.contains(&"#shorts".to_string()));
        assert_eq!(short.start, 0.0);
        assert_eq!(short.end, 20.0);
    }
}
