//! Segment extraction with a single select/aselect filter pass.

use std::path::Path;

use vpost_models::TimeSpan;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::segment_cut_filter;

/// Extract and concatenate the kept segments in one encode.
///
/// With audio enabled the aselect expression mirrors the video select, which
/// keeps audio-video sync across every cut point.
pub async fn cut_with_segments(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    segments: &[TimeSpan],
    with_audio: bool,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let filter = segment_cut_filter(segments, with_audio);

    let mut cmd = FfmpegCommand::new(output.as_ref())
        .input(input.as_ref())
        .filter_complex(filter)
        .map("[outv]");

    cmd = if with_audio {
        cmd.map("[outa]")
            .audio_codec("aac")
            .audio_bitrate("192k")
    } else {
        cmd.no_audio()
    };

    let cmd = cmd
        .video_codec("libx264")
        .preset("fast")
        .crf(18)
        .faststart();

    runner.run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_shape_with_audio() {
        let segments = [TimeSpan::new(0.0, 5.0), TimeSpan::new(8.0, 12.0)];
        let filter = segment_cut_filter(&segments, true);
        let cmd = FfmpegCommand::new("nosilence.mp4")
            .input("original.mp4")
            .filter_complex(filter)
            .map("[outv]")
            .map("[outa]");
        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.contains("between(t,0,5)+between(t,8,12)"));
        assert!(joined.contains("-map [outv] -map [outa]"));
    }
}
