//! Single-frame extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Extract one frame at `timestamp` seconds into a PNG/JPEG file.
pub async fn extract_frame(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    timestamp: f64,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(output_path.as_ref())
        .seek(timestamp)
        .input(video_path.as_ref())
        .single_frame();

    FfmpegRunner::new().run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_command_seeks_before_input() {
        let cmd = FfmpegCommand::new("frame.png")
            .seek(42.5)
            .input("webcam.mp4")
            .single_frame();
        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "webcam.mp4").unwrap();
        assert!(ss < input);
        assert!(args.contains(&"42.500".to_string()));
        assert!(args.contains(&"-vframes".to_string()));
    }
}
