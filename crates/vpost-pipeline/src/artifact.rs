//! The artifact directory arena.
//!
//! Stages receive an `ArtifactDir` handle instead of free-form filesystem
//! access. Every artifact has exactly one producing stage; reboot trims the
//! directory back to the seed set in one operation.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{PipelineError, PipelineResult};

/// Canonical artifact names.
pub mod names {
    pub const CONFIG: &str = "config.json";
    pub const SCREEN: &str = "screen.mp4";
    pub const WEBCAM: &str = "webcam.mp4";
    pub const COMBINED: &str = "combined.webm";
    pub const SCREEN_RAW_PREFIX: &str = "screen_raw";
    pub const WEBCAM_RAW_PREFIX: &str = "webcam_raw";
    pub const ORIGINAL: &str = "original.mp4";
    pub const SEGMENTS: &str = "segments.json";
    pub const NOSILENCE: &str = "nosilence.mp4";
    pub const SCREEN_NOSILENCE: &str = "screennosilence.mp4";
    pub const WEBCAM_NOSILENCE: &str = "webcamnosilence.mp4";
    pub const TRANSCRIPTION_JSON: &str = "transcription.json";
    pub const TRANSCRIPTION_TXT: &str = "transcription.txt";
    pub const SHORTS_DIR: &str = "shorts";
    pub const SHORTS_SUGGESTIONS: &str = "shorts_suggestions.json";
    pub const BROLL_DIR: &str = "broll";
    pub const BROLL_SUGGESTIONS: &str = "broll_suggestions.json";
    pub const BROLL_CLIPS: &str = "broll_clips.json";
    pub const ILLUSTRATED: &str = "illustrated.mp4";
    pub const SEO: &str = "seo.json";
    pub const THUMBNAIL: &str = "thumbnail.png";
    pub const SCHEDULE: &str = "schedule.json";
    /// Diagnostic only, not an artifact
    pub const IMAGE_DEBUG: &str = "gemini_debug.json";
}

/// Files a reboot preserves.
pub const SEED_FILES: [&str; 3] = [names::CONFIG, names::SCREEN, names::WEBCAM];

/// Handle to one project's artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Artifact directory for a folder name under the shared output root.
    pub fn from_base(base: impl AsRef<Path>, folder_name: &str) -> Self {
        Self {
            root: base.as_ref().join(folder_name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory's base name, which namespaces the blob store.
    pub fn folder_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Absolute path of a named artifact (or relative path like
    /// "shorts/short_01.mp4").
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub async fn create(&self) -> PipelineResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Read and parse a JSON artifact.
    pub async fn read_json<T: DeserializeOwned>(&self, name: &str) -> PipelineResult<T> {
        let path = self.path(name);
        if !path.exists() {
            return Err(PipelineError::missing_input(name));
        }
        let raw = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write a JSON artifact (pretty, for forensic inspection).
    pub async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> PipelineResult<()> {
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(self.path(name), raw).await?;
        Ok(())
    }

    pub async fn read_to_string(&self, name: &str) -> PipelineResult<String> {
        let path = self.path(name);
        if !path.exists() {
            return Err(PipelineError::missing_input(name));
        }
        Ok(fs::read_to_string(path).await?)
    }

    pub async fn write_string(&self, name: &str, content: &str) -> PipelineResult<()> {
        fs::write(self.path(name), content).await?;
        Ok(())
    }

    pub async fn write_bytes(&self, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        fs::write(self.path(name), bytes).await?;
        Ok(())
    }

    /// Remove an artifact if present.
    pub async fn delete(&self, name: &str) -> PipelineResult<()> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    /// Create a subdirectory (shorts/, broll/) lazily.
    pub async fn ensure_subdir(&self, name: &str) -> PipelineResult<PathBuf> {
        let path = self.root.join(name);
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Files in a subdirectory with the given extension, sorted by name.
    pub async fn list(&self, subdir: &str, extension: &str) -> PipelineResult<Vec<PathBuf>> {
        let dir = self.root.join(subdir);
        let mut files = Vec::new();
        if !dir.exists() {
            return Ok(files);
        }
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file()
                && path
                    .extension()
                    .map(|e| e.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// First file whose name starts with `prefix` (raw uploads keep their
    /// original container extension).
    pub async fn find_with_prefix(&self, prefix: &str) -> PipelineResult<Option<PathBuf>> {
        if !self.root.exists() {
            return Ok(None);
        }
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_file() && name.starts_with(prefix) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    pub async fn file_size(&self, name: &str) -> PipelineResult<u64> {
        Ok(fs::metadata(self.path(name)).await?.len())
    }

    /// Delete every file and subdirectory except the seed set.
    ///
    /// This is reboot's destructive trim; partially written outputs from a
    /// revoked encoder run go with it.
    pub async fn reset_to_seed(&self) -> PipelineResult<Vec<String>> {
        let mut deleted = Vec::new();
        if !self.root.exists() {
            return Ok(deleted);
        }
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if SEED_FILES.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
            deleted.push(name);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn dir_with(files: &[&str]) -> (TempDir, ArtifactDir) {
        let tmp = TempDir::new().unwrap();
        let dir = ArtifactDir::new(tmp.path().join("video_test"));
        dir.create().await.unwrap();
        for f in files {
            if let Some((sub, _)) = f.rsplit_once('/') {
                dir.ensure_subdir(sub).await.unwrap();
            }
            dir.write_string(f, "x").await.unwrap();
        }
        (tmp, dir)
    }

    #[tokio::test]
    async fn reset_to_seed_keeps_seed_files() {
        let (_tmp, dir) = dir_with(&[
            "config.json",
            "screen.mp4",
            "webcam.mp4",
            "original.mp4",
            "nosilence.mp4",
            "segments.json",
            "shorts/short_01.mp4",
            "broll/clip_0.mp4",
        ])
        .await;

        let deleted = dir.reset_to_seed().await.unwrap();

        assert!(dir.exists("config.json"));
        assert!(dir.exists("screen.mp4"));
        assert!(dir.exists("webcam.mp4"));
        assert!(!dir.exists("original.mp4"));
        assert!(!dir.exists("segments.json"));
        assert!(!dir.exists("shorts"));
        assert!(!dir.exists("broll"));
        assert_eq!(deleted.len(), 5);
    }

    #[tokio::test]
    async fn read_missing_json_is_missing_input() {
        let (_tmp, dir) = dir_with(&[]).await;
        let err = dir
            .read_json::<serde_json::Value>("segments.json")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[tokio::test]
    async fn find_with_prefix_matches_any_container() {
        let (_tmp, dir) = dir_with(&["screen_raw.webm"]).await;
        let found = dir.find_with_prefix("screen_raw").await.unwrap().unwrap();
        assert!(found.to_string_lossy().ends_with("screen_raw.webm"));
        assert!(dir.find_with_prefix("webcam_raw").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let (_tmp, dir) = dir_with(&[
            "shorts/short_02.mp4",
            "shorts/short_01.mp4",
            "shorts/notes.txt",
        ])
        .await;
        let files = dir.list("shorts", "mp4").await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().ends_with("short_01.mp4"));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let (_tmp, dir) = dir_with(&[]).await;
        let value = serde_json::json!({"segments": [{"start": 0.0, "end": 1.5}]});
        dir.write_json("segments.json", &value).await.unwrap();
        let back: serde_json::Value = dir.read_json("segments.json").await.unwrap();
        assert_eq!(back, value);
    }
}
