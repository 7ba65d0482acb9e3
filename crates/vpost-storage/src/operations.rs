//! High-level storage operations.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::client::BlobStore;
use crate::error::StorageResult;

/// Content type for an artifact file, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".webm") {
        "video/webm"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".json") {
        "application/json"
    } else if lower.ends_with(".txt") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

impl BlobStore {
    /// Mirror a project's artifact directory under `<folder_name>/`.
    ///
    /// Walks the directory one level of subdirectories deep (shorts/,
    /// broll/). A single failed file is logged and skipped so one bad
    /// artifact cannot sink the schedule stage. Returns relative path →
    /// object key for the manifest.
    pub async fn mirror_project_dir(
        &self,
        dir: impl AsRef<Path>,
        folder_name: &str,
    ) -> StorageResult<BTreeMap<String, String>> {
        let dir = dir.as_ref();
        let mut uploaded = BTreeMap::new();

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if path.is_dir() {
                let mut sub = tokio::fs::read_dir(&path).await?;
                while let Some(sub_entry) = sub.next_entry().await? {
                    let sub_path = sub_entry.path();
                    if !sub_path.is_file() {
                        continue;
                    }
                    let rel = format!("{}/{}", name, sub_entry.file_name().to_string_lossy());
                    self.mirror_one(&sub_path, folder_name, &rel, &mut uploaded)
                        .await;
                }
            } else if path.is_file() {
                self.mirror_one(&path, folder_name, &name, &mut uploaded).await;
            }
        }

        info!(
            folder = folder_name,
            files = uploaded.len(),
            "mirrored artifact directory"
        );
        Ok(uploaded)
    }

    async fn mirror_one(
        &self,
        path: &Path,
        folder_name: &str,
        rel: &str,
        uploaded: &mut BTreeMap<String, String>,
    ) {
        let key = format!("{folder_name}/{rel}");
        match self.upload_file(path, &key, content_type_for(rel)).await {
            Ok(()) => {
                uploaded.insert(rel.to_string(), key);
            }
            Err(e) => {
                warn!(file = rel, "mirror upload failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("illustrated.mp4"), "video/mp4");
        assert_eq!(content_type_for("thumbnail.PNG"), "image/png");
        assert_eq!(content_type_for("seo.json"), "application/json");
        assert_eq!(content_type_for("transcription.txt"), "text/plain");
        assert_eq!(content_type_for("combined.webm"), "video/webm");
        assert_eq!(content_type_for("weird.bin"), "application/octet-stream");
    }
}
