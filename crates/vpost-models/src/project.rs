//! Project record and status state machine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RecordingConfig;
use crate::ids::{ChainHandle, ProjectId};
use crate::stage::{Stage, TOTAL_STEPS};

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Controller is still writing raw inputs
    Uploading,
    /// Raw inputs complete, chain not yet submitted
    Converting,
    /// Reset by reboot, awaiting resubmission
    Created,
    /// A chain is executing
    Processing,
    /// Automatic pipeline finished; publication awaits approval
    ReadyToUpload,
    /// Publication stage finished
    Completed,
    /// A stage reported terminal failure
    Failed,
    /// Revoked by the user
    Stopped,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Uploading => "uploading",
            ProjectStatus::Converting => "converting",
            ProjectStatus::Created => "created",
            ProjectStatus::Processing => "processing",
            ProjectStatus::ReadyToUpload => "ready_to_upload",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Stopped => "stopped",
        }
    }

    /// Whether the state machine permits moving to `next`.
    ///
    /// No state is terminal: everything is re-enterable through reboot or
    /// partial resubmission, and any state may fail or be stopped.
    pub fn can_transition_to(self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        if self == next {
            return true;
        }
        match next {
            Failed | Stopped | Created => true,
            Converting => matches!(self, Uploading),
            Processing => matches!(
                self,
                Converting | Created | ReadyToUpload | Failed | Stopped | Processing
            ),
            ReadyToUpload => matches!(self, Processing),
            Completed => matches!(self, Processing),
            Uploading => false,
        }
    }

    /// Publication may only be submitted from these states.
    pub fn allows_publication(self) -> bool {
        matches!(
            self,
            ProjectStatus::ReadyToUpload | ProjectStatus::Completed | ProjectStatus::Failed
        )
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage execution status inside the project record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Bookkeeping for one stage of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepRecord {
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn processing() -> Self {
        Self {
            status: StepStatus::Processing,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Manifest of the named products a project has produced.
///
/// Paths are relative to the artifact directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputManifest {
    pub original: Option<String>,
    pub nosilence: Option<String>,
    pub illustrated: Option<String>,
    pub thumbnail: Option<String>,
    pub seo: Option<String>,
    pub schedule: Option<String>,
    #[serde(default)]
    pub shorts: Vec<String>,
    /// Blob-store key per mirrored file, written by the scheduling stage
    #[serde(default)]
    pub mirror: BTreeMap<String, String>,
}

/// A project record in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Artifact directory base name; also the blob-store namespace
    pub folder_name: String,
    pub status: ProjectStatus,
    pub current_step: u8,
    pub step_name: Option<String>,
    /// Coarse percentage: (current_step / total_steps) * 100
    pub progress: u8,
    pub config: RecordingConfig,
    /// Keyed by stage wire name
    #[serde(default)]
    pub steps: BTreeMap<String, StepRecord>,
    #[serde(default)]
    pub outputs: OutputManifest,
    /// Root handle of the most recently submitted chain
    pub task_handle: Option<ChainHandle>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    /// New record in `uploading`, as the controller creates it.
    pub fn new(
        name: impl Into<String>,
        folder_name: impl Into<String>,
        config: RecordingConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            folder_name: folder_name.into(),
            status: ProjectStatus::Uploading,
            current_step: 0,
            step_name: None,
            progress: 0,
            config,
            steps: BTreeMap::new(),
            outputs: OutputManifest::default(),
            task_handle: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Coarse progress percentage for a stage index.
    pub fn progress_for_step(step: u8) -> u8 {
        ((step as u32 * 100) / TOTAL_STEPS) as u8
    }

    pub fn step_record(&self, stage: Stage) -> Option<&StepRecord> {
        self.steps.get(stage.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(ProjectStatus::ReadyToUpload.as_str(), "ready_to_upload");
        let json = serde_json::to_string(&ProjectStatus::ReadyToUpload).unwrap();
        assert_eq!(json, "\"ready_to_upload\"");
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        use ProjectStatus::*;
        assert!(Uploading.can_transition_to(Converting));
        assert!(Converting.can_transition_to(Processing));
        assert!(Processing.can_transition_to(ReadyToUpload));
        assert!(ReadyToUpload.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Stopped.can_transition_to(Processing));
        // anything can fail, stop, or reboot
        assert!(Completed.can_transition_to(Failed));
        assert!(ReadyToUpload.can_transition_to(Stopped));
        assert!(Completed.can_transition_to(Created));
        // but nothing goes back to uploading
        assert!(!Processing.can_transition_to(Uploading));
        assert!(!Converting.can_transition_to(ReadyToUpload));
    }

    #[test]
    fn publication_gate() {
        assert!(ProjectStatus::ReadyToUpload.allows_publication());
        assert!(ProjectStatus::Failed.allows_publication());
        assert!(ProjectStatus::Completed.allows_publication());
        assert!(!ProjectStatus::Processing.allows_publication());
        assert!(!ProjectStatus::Stopped.allows_publication());
    }

    #[test]
    fn progress_is_coarse() {
        assert_eq!(Project::progress_for_step(0), 0);
        assert_eq!(Project::progress_for_step(6), 50);
        assert_eq!(Project::progress_for_step(12), 100);
    }
}
