//! Karaoke ASS subtitle generation for shorts.
//!
//! Words are timed by splitting each transcript segment's span evenly across
//! its words, grouped 2 words per line and 2 lines per screen. Every word
//! gets one dialogue event showing its group with itself in the highlight
//! style (accent color) and the rest in white.

use vpost_models::TranscriptSegment;

const WORDS_PER_LINE: usize = 2;
const LINES_PER_GROUP: usize = 2;
const WORDS_PER_GROUP: usize = WORDS_PER_LINE * LINES_PER_GROUP;

const ASS_HEADER: &str = "\
[Script Info]
Title: Karaoke Subtitles
ScriptType: v4.00+
PlayResX: 1080
PlayResY: 1920

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Normal,Impact,110,&H00FFFFFF,&H00FFFFFF,&H00000000,&H00000000,1,0,0,0,100,100,0,0,1,5,0,5,40,40,0,1
Style: Highlight,Impact,110,&H0000FFFF,&H0000FFFF,&H00000000,&H00000000,1,0,0,0,100,100,0,0,1,5,0,5,40,40,0,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

#[derive(Debug, Clone)]
struct TimedWord {
    word: String,
    /// Relative to the clip start
    start: f64,
    end: f64,
}

/// Format seconds as an ASS timestamp (H:MM:SS.cc).
fn format_ass_time(seconds: f64) -> String {
    let h = (seconds / 3600.0) as u32;
    let m = ((seconds % 3600.0) / 60.0) as u32;
    let s = seconds % 60.0;
    format!("{h}:{m:02}:{s:05.2}")
}

/// Words overlapping the `[start, end]` window, uppercased, with per-word
/// timestamps re-based to the clip.
fn collect_words(segments: &[TranscriptSegment], start: f64, end: f64) -> Vec<TimedWord> {
    let mut all_words = Vec::new();

    for seg in segments {
        if seg.end < start || seg.start > end {
            continue;
        }
        let text = seg.text.trim().to_uppercase();
        if text.is_empty() {
            continue;
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let word_duration = (seg.end - seg.start) / words.len() as f64;
        for (i, word) in words.iter().enumerate() {
            let word_start = seg.start + i as f64 * word_duration;
            let word_end = word_start + word_duration;
            let rel_start = (word_start - start).max(0.0);
            let rel_end = (word_end - start).min(end - start);
            if rel_end > rel_start {
                all_words.push(TimedWord {
                    word: word.to_string(),
                    start: rel_start,
                    end: rel_end,
                });
            }
        }
    }
    all_words
}

/// Build the complete ASS document for one short.
pub fn build_karaoke_ass(segments: &[TranscriptSegment], start: f64, end: f64) -> String {
    let mut out = String::from(ASS_HEADER);

    let words = collect_words(segments, start, end);
    for group in words.chunks(WORDS_PER_GROUP) {
        for (highlight_idx, current) in group.iter().enumerate() {
            let rendered: Vec<String> = group
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    if i == highlight_idx {
                        format!("{{\\rHighlight}}{}{{\\rNormal}}", w.word)
                    } else {
                        w.word.clone()
                    }
                })
                .collect();

            let line1 = rendered[..rendered.len().min(WORDS_PER_LINE)].join(" ");
            let line2 = if rendered.len() > WORDS_PER_LINE {
                Some(rendered[WORDS_PER_LINE..].join(" "))
            } else {
                None
            };
            let text = match line2 {
                Some(l2) => format!("{line1}\\N{l2}"),
                None => line1,
            };

            out.push_str(&format!(
                "Dialogue: 0,{},{},Normal,,0,0,0,,{}\n",
                format_ass_time(current.start),
                format_ass_time(current.end),
                text
            ));
        }
    }
    out
}
