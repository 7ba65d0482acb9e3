//! FFmpeg/FFprobe CLI wrapper.
//!
//! This crate provides:
//! - A command builder and runner with timeout, cancellation and stderr
//!   capture for error reporting
//! - Video probing (duration, dimensions, frame rate)
//! - Silence detection and the kept-segment arithmetic
//! - Filter-graph builders for composition, shorts and b-roll overlays
//! - Karaoke ASS subtitle generation
//! - Single-frame extraction

pub mod command;
pub mod cut;
pub mod error;
pub mod filters;
pub mod frame;
pub mod fs_utils;
pub mod probe;
pub mod silence;
pub mod subtitles;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use silence::{detect_silences, speech_segments, silences_to_spans, RawSilence, SilenceParams};
