//! Publication schedule document (schedule.json).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which product an upload entry ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// The b-roll-illustrated main cut
    Illustrated,
    /// Unlisted full-length variant of the trimmed cut
    Classroom,
    Short,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Illustrated => "illustrated",
            UploadKind::Classroom => "classroom",
            UploadKind::Short => "short",
        }
    }
}

/// Host-side visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

/// One scheduled upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledUpload {
    #[serde(rename = "type")]
    pub kind: UploadKind,
    /// Path relative to the artifact directory
    pub file: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub privacy: Privacy,
    /// YYYY-MM-DD in the publication timezone
    pub scheduled_date: String,
    /// HH:MM
    pub scheduled_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub status: String,
}

/// Outcome of one successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(rename = "type")]
    pub kind: UploadKind,
    pub title: String,
    pub video_id: String,
    pub url: String,
    pub status: String,
    pub privacy: Privacy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<String>,
}

/// Outcome of one failed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadError {
    #[serde(rename = "type")]
    pub kind: UploadKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub error: String,
}

/// Per-item results appended by the publication stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UploadResults {
    pub success: bool,
    #[serde(default)]
    pub uploads: Vec<UploadResult>,
    #[serde(default)]
    pub errors: Vec<UploadError>,
}

/// The schedule.json document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub uploads: Vec<ScheduledUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_results: Option<UploadResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(uploads: Vec<ScheduledUpload>) -> Self {
        Self {
            created_at: Utc::now(),
            status: "ready".to_string(),
            uploads,
            upload_results: None,
            uploaded_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_kind_serializes_as_type_field() {
        let upload = ScheduledUpload {
            kind: UploadKind::Classroom,
            file: "nosilence.mp4".to_string(),
            title: "[Classroom] Lesson".to_string(),
            description: String::new(),
            tags: vec![],
            privacy: Privacy::Unlisted,
            scheduled_date: "2026-08-04".to_string(),
            scheduled_time: "10:00".to_string(),
            thumbnail: None,
            status: "pending".to_string(),
        };
        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["type"], "classroom");
        assert_eq!(json["privacy"], "unlisted");
        assert!(json.get("thumbnail").is_none());
    }

    #[test]
    fn results_round_trip_in_place() {
        let mut schedule = Schedule::new(vec![]);
        schedule.upload_results = Some(UploadResults {
            success: true,
            uploads: vec![UploadResult {
                kind: UploadKind::Short,
                title: "t".to_string(),
                video_id: "abc".to_string(),
                url: "https://host/abc".to_string(),
                status: "uploaded".to_string(),
                privacy: Privacy::Private,
                scheduled: Some("2026-08-04T18:00:00Z".to_string()),
            }],
            errors: vec![],
        });
        let json = serde_json::to_string(&schedule).unwrap();
        let back: Schedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }
}
