//! Media error types.

use std::path::PathBuf;

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// How many trailing characters of encoder output an error carries.
pub const STDERR_TAIL_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found on PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found on PATH")]
    FfprobeNotFound,

    #[error("FFmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        /// Last {STDERR_TAIL_CHARS} characters of diagnostic output
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("FFmpeg timed out after {0} seconds")]
    Timeout(u64),

    #[error("FFmpeg run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaError {
    /// Build an encoder failure carrying the tail of its stderr.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<&str>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr_tail: stderr.map(tail),
            exit_code,
        }
    }
}

/// Last `STDERR_TAIL_CHARS` characters of a diagnostic dump.
pub fn tail(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= STDERR_TAIL_CHARS {
        s.to_string()
    } else {
        chars[chars.len() - STDERR_TAIL_CHARS..].iter().collect()
    }
}
