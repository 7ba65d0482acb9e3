//! Stage 4: transcription of the trimmed cut.
//!
//! A mono low-bitrate audio track goes to the speech-to-text service; the
//! result is optionally spell-corrected by the language model under a
//! strict word-count guard, then written as the canonical transcript.
//! Segment order and boundaries are never altered.

use tracing::{info, warn};

use vpost_media::FfmpegCommand;
use vpost_models::Transcription;
use vpost_services::{CompletionRequest, LanguageModel, SpeechToText};

use crate::artifact::{names, ArtifactDir};
use crate::context::StageContext;
use crate::error::{PipelineError, PipelineResult};

const AUDIO_TEMP: &str = "audio_temp.mp3";

/// Word-count drift tolerated for the whole text.
const TEXT_DRIFT: usize = 3;
/// Word-count drift tolerated per segment.
const SEGMENT_DRIFT: usize = 2;

pub async fn run(ctx: &StageContext, dir: &ArtifactDir) -> PipelineResult<()> {
    if !dir.exists(names::NOSILENCE) {
        return Err(PipelineError::missing_input(names::NOSILENCE));
    }

    // Mono mp3 keeps the upload small without hurting recognition.
    let audio_path = dir.path(AUDIO_TEMP);
    let extract = FfmpegCommand::new(&audio_path)
        .input(dir.path(names::NOSILENCE))
        .output_args(["-vn", "-acodec", "libmp3lame", "-q:a", "2", "-ac", "1"]);
    ctx.runner().run(&extract).await?;
    let audio_size_mb = dir.file_size(AUDIO_TEMP).await? / (1024 * 1024);
    info!(size_mb = audio_size_mb, "audio extracted");

    let result = ctx
        .services
        .speech
        .transcribe(&audio_path, &ctx.settings.language)
        .await;
    dir.delete(AUDIO_TEMP).await.ok();
    let mut transcription = result?;

    info!(
        chars = transcription.text.len(),
        segments = transcription.segments.len(),
        "transcription received"
    );

    correct_transcription(
        ctx.services.llm.as_ref(),
        &mut transcription,
        &ctx.settings.glossary,
    )
    .await;

    dir.write_json(names::TRANSCRIPTION_JSON, &transcription).await?;
    dir.write_string(names::TRANSCRIPTION_TXT, &transcription.text)
        .await?;
    info!("transcription.json and transcription.txt written");

    Ok(())
}

/// Spelling/grammar pass that must not change what was said.
///
/// The whole text is corrected first; rejection there skips the per-segment
/// pass entirely. Each segment correction is independently guarded, so one
/// runaway rewrite cannot poison the rest. Model failures leave the
/// transcript untouched.
async fn correct_transcription(
    llm: &dyn LanguageModel,
    transcription: &mut Transcription,
    glossary: &[String],
) {
    let prompt = correction_prompt(&transcription.text, glossary);
    let corrected = match llm.complete(&CompletionRequest::new(prompt).with_temperature(0.1)).await
    {
        Ok(text) => text,
        Err(e) => {
            let message = e.to_string();
            warn!("correction skipped: {message}");
            return;
        }
    };

    if !within_word_drift(&transcription.text, &corrected, TEXT_DRIFT) {
        warn!(
            original = word_count(&transcription.text),
            corrected = word_count(&corrected),
            "correction rejected: word count drifted"
        );
        return;
    }
    transcription.text = corrected;

    for segment in &mut transcription.segments {
        if segment.text.trim().is_empty() {
            continue;
        }
        let prompt = correction_prompt(&segment.text, glossary);
        match llm
            .complete(&CompletionRequest::new(prompt).with_temperature(0.1))
            .await
        {
            Ok(corrected) if within_word_drift(&segment.text, &corrected, SEGMENT_DRIFT) => {
                segment.text = corrected;
            }
            Ok(_) => {}
            Err(e) => {
                let message = e.to_string();
                warn!("segment correction skipped: {message}");
                return;
            }
        }
    }
}

fn correction_prompt(text: &str, glossary: &[String]) -> String {
    format!(
        "Correct ONLY the spelling and grammar of the following text.\n\
         STRICT RULES:\n\
         - Do NOT add words\n\
         - Do NOT remove words\n\
         - Do NOT reorder words\n\
         - Keep EXACTLY the same number of words\n\n\
         Technical terms to keep as-is: {}.\n\n\
         Text to correct:\n{}\n\n\
         Reply with ONLY the corrected text, nothing else.",
        glossary.join(", "),
        text
    )
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether two texts stay within `max` words of each other.
fn within_word_drift(a: &str, b: &str, max: usize) -> bool {
    word_count(a).abs_diff(word_count(b)) <= max
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vpost_models::TranscriptSegment;
    use vpost_services::StubLanguageModel;

    fn transcript(text: &str, seg_texts: &[&str]) -> Transcription {
        Transcription {
            text: text.to_string(),
            segments: seg_texts
                .iter()
                .enumerate()
                .map(|(i, t)| TranscriptSegment {
                    start: i as f64,
                    end: i as f64 + 1.0,
                    text: t.to_string(),
                })
                .collect(),
            language: "en".to_string(),
            duration: seg_texts.len() as f64,
        }
    }

    #[test]
    fn drift_guard() {
        assert!(within_word_drift("one two three", "one too three", 0));
        assert!(within_word_drift("one two three", "one two three four", 3));
        assert!(!within_word_drift("a b c d e f", "a b", 3));
    }

    #[tokio::test]
    async fn rejected_global_correction_keeps_everything() {
        let llm = Arc::new(StubLanguageModel::with_responses([
            "completely different and much longer text that drifted away from the original",
        ]));
        let mut t = transcript("short text here", &["short text here"]);
        correct_transcription(llm.as_ref(), &mut t, &[]).await;
        assert_eq!(t.text, "short text here");
        assert_eq!(t.segments[0].text, "short text here");
    }

    #[tokio::test]
    async fn accepted_corrections_apply_per_segment() {
        let llm = Arc::new(StubLanguageModel::with_responses([
            // global: same word count
            "won too three fore",
            // segment 1: accepted (same count)
            "won too",
            // segment 2: rejected (drift of 3 > 2)
            "three fore five six seven",
        ]));
        let mut t = transcript("one two three four", &["one two", "three four"]);
        correct_transcription(llm.as_ref(), &mut t, &[]).await;
        assert_eq!(t.text, "won too three fore");
        assert_eq!(t.segments[0].text, "won too");
        assert_eq!(t.segments[1].text, "three four");
    }

    #[tokio::test]
    async fn llm_failure_is_non_fatal() {
        let llm = Arc::new(StubLanguageModel::with_responses(Vec::<String>::new()));
        let mut t = transcript("hello world", &["hello world"]);
        correct_transcription(llm.as_ref(), &mut t, &[]).await;
        assert_eq!(t.text, "hello world");
    }

    #[test]
    fn prompt_names_the_glossary() {
        let prompt = correction_prompt("text", &["FFmpeg".to_string(), "Rust".to_string()]);
        assert!(prompt.contains("FFmpeg, Rust"));
    }
}
