//! Canonical transcript document (transcription.json).

use serde::{Deserialize, Serialize};

/// One timestamped utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The full transcript of the silence-trimmed cut.
///
/// Segments keep the order and boundaries returned by the speech-to-text
/// service; downstream stages rely on those boundaries for snapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
    pub duration: f64,
}

impl Transcription {
    /// Concatenated text of segments falling inside `[start, end + margin]`.
    ///
    /// Used to scope metadata prompts to a single short.
    pub fn text_between(&self, start: f64, end: f64, margin: f64) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            if seg.start >= start && seg.end <= end + margin {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(seg.text.trim());
            }
        }
        out
    }

    /// Segments rendered as `[12.3s - 15.6s]: text` lines for LLM prompts.
    pub fn timestamped_lines(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push_str(&format!(
                "[{:.1}s - {:.1}s]: {}\n",
                seg.start,
                seg.end,
                seg.text.trim()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Transcription {
        Transcription {
            text: "hello world again".to_string(),
            segments: vec![
                TranscriptSegment {
                    start: 0.0,
                    end: 2.0,
                    text: "hello".to_string(),
                },
                TranscriptSegment {
                    start: 2.0,
                    end: 4.0,
                    text: "world".to_string(),
                },
                TranscriptSegment {
                    start: 10.0,
                    end: 12.0,
                    text: "again".to_string(),
                },
            ],
            language: "en".to_string(),
            duration: 12.0,
        }
    }

    #[test]
    fn text_between_scopes_to_window() {
        let t = transcript();
        assert_eq!(t.text_between(0.0, 4.0, 0.0), "hello world");
        assert_eq!(t.text_between(9.0, 12.0, 0.0), "again");
        assert_eq!(t.text_between(20.0, 30.0, 0.0), "");
    }

    #[test]
    fn timestamped_lines_format() {
        let lines = transcript().timestamped_lines();
        assert!(lines.contains("[0.0s - 2.0s]: hello"));
        assert!(lines.ends_with("again\n"));
    }
}
