//! Filesystem helpers.

use std::path::Path;

use tokio::fs;

use crate::error::MediaResult;

/// Move a file, falling back to copy-and-delete across filesystems.
///
/// The cross-device copy goes through a temp file in the destination
/// directory so the final rename stays atomic there.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        // EXDEV: source and destination are on different filesystems
        Err(e) if e.raw_os_error() == Some(18) => {
            let tmp = dst.with_extension("tmp");
            fs::copy(src, &tmp).await?;
            if let Err(e) = fs::rename(&tmp, dst).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(e.into());
            }
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!("failed to remove source after move: {}: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_within_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("sub").join("b.mp4");
        fs::write(&src, b"data").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn move_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }
}
