//! Durable project registry.
//!
//! One JSON document per project in a shared Redis store, with
//! set-field-by-path partial updates (last-writer-wins per field). The
//! `ProjectRegistry` trait is the capability surface stage bodies and the
//! orchestrator depend on; `MemoryRegistry` is the test double.

pub mod error;
pub mod memory;
pub mod redis_store;

mod fields;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use vpost_models::{ChainHandle, Project, ProjectId, ProjectStatus, Stage};

pub use error::{RegistryError, RegistryResult};
pub use fields::apply_field;
pub use memory::MemoryRegistry;
pub use redis_store::{RedisRegistry, RedisRegistryConfig};

/// A dotted field path and its replacement value.
pub type FieldUpdate = (String, Value);

/// The shared mutable project store.
///
/// Updates are partial: only the named field paths are replaced, and
/// `updated_at` is always refreshed. There is no cross-field transaction;
/// the only guarded invariant is handled by the orchestrator (revoke before
/// handle overwrite).
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    /// Insert a new project record.
    async fn create(&self, project: &Project) -> RegistryResult<()>;

    /// Fetch a project by id.
    async fn get(&self, id: &ProjectId) -> RegistryResult<Option<Project>>;

    /// Fetch a project by its artifact folder name.
    async fn get_by_folder(&self, folder_name: &str) -> RegistryResult<Option<Project>>;

    /// Replace the whole document.
    async fn put(&self, project: &Project) -> RegistryResult<()>;

    /// Apply set-field-by-path updates.
    async fn update_fields(&self, id: &ProjectId, fields: Vec<FieldUpdate>) -> RegistryResult<()>;

    /// Fetch a project, failing when absent.
    async fn require(&self, id: &ProjectId) -> RegistryResult<Project> {
        self.get(id)
            .await?
            .ok_or_else(|| RegistryError::not_found(id.to_string()))
    }

    /// Set the lifecycle status.
    async fn set_status(&self, id: &ProjectId, status: ProjectStatus) -> RegistryResult<()> {
        self.update_fields(id, vec![("status".to_string(), json!(status))])
            .await
    }

    /// Record the root handle of a newly submitted chain.
    async fn set_task_handle(&self, id: &ProjectId, handle: &ChainHandle) -> RegistryResult<()> {
        self.update_fields(id, vec![("task_handle".to_string(), json!(handle))])
            .await
    }

    /// Stage-entry bookkeeping: step marked processing, coarse progress.
    async fn begin_stage(&self, id: &ProjectId, stage: Stage) -> RegistryResult<()> {
        let step = stage.index();
        self.update_fields(
            id,
            vec![
                ("current_step".to_string(), json!(step)),
                ("step_name".to_string(), json!(stage.label())),
                ("progress".to_string(), json!(Project::progress_for_step(step))),
                (
                    format!("steps.{}.status", stage.wire_name()),
                    json!("processing"),
                ),
                (
                    format!("steps.{}.started_at", stage.wire_name()),
                    json!(Utc::now()),
                ),
                (format!("steps.{}.error", stage.wire_name()), Value::Null),
            ],
        )
        .await
    }

    /// Stage-exit bookkeeping on success.
    async fn complete_stage(&self, id: &ProjectId, stage: Stage) -> RegistryResult<()> {
        self.update_fields(
            id,
            vec![
                (
                    format!("steps.{}.status", stage.wire_name()),
                    json!("completed"),
                ),
                (
                    format!("steps.{}.completed_at", stage.wire_name()),
                    json!(Utc::now()),
                ),
            ],
        )
        .await
    }

    /// Stage-exit bookkeeping on failure; the project fails with it.
    async fn fail_stage(&self, id: &ProjectId, stage: Stage, error: &str) -> RegistryResult<()> {
        self.update_fields(
            id,
            vec![
                ("status".to_string(), json!(ProjectStatus::Failed)),
                ("error".to_string(), json!(error)),
                (format!("steps.{}.status", stage.wire_name()), json!("failed")),
                (format!("steps.{}.error", stage.wire_name()), json!(error)),
            ],
        )
        .await
    }

    /// Reset bookkeeping after a reboot trimmed the artifact directory.
    async fn reset_for_reboot(&self, id: &ProjectId) -> RegistryResult<()> {
        self.update_fields(
            id,
            vec![
                ("status".to_string(), json!(ProjectStatus::Created)),
                ("current_step".to_string(), json!(0)),
                ("step_name".to_string(), Value::Null),
                ("progress".to_string(), json!(0)),
                ("steps".to_string(), json!({})),
                ("outputs".to_string(), json!(vpost_models::OutputManifest::default())),
                ("error".to_string(), Value::Null),
                ("completed_at".to_string(), Value::Null),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpost_models::RecordingConfig;

    #[tokio::test]
    async fn begin_and_complete_stage_roundtrip() {
        let registry = MemoryRegistry::new();
        let project = Project::new("demo", "video_demo", RecordingConfig::default());
        let id = project.id.clone();
        registry.create(&project).await.unwrap();

        registry.begin_stage(&id, Stage::SilenceTrim).await.unwrap();
        let p = registry.require(&id).await.unwrap();
        assert_eq!(p.current_step, 2);
        assert_eq!(p.step_name.as_deref(), Some("Removing silences"));
        assert_eq!(p.progress, Project::progress_for_step(2));
        assert_eq!(
            p.step_record(Stage::SilenceTrim).unwrap().status,
            vpost_models::StepStatus::Processing
        );

        registry.complete_stage(&id, Stage::SilenceTrim).await.unwrap();
        let p = registry.require(&id).await.unwrap();
        let record = p.step_record(Stage::SilenceTrim).unwrap();
        assert_eq!(record.status, vpost_models::StepStatus::Completed);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn fail_stage_fails_the_project() {
        let registry = MemoryRegistry::new();
        let project = Project::new("demo", "video_demo", RecordingConfig::default());
        let id = project.id.clone();
        registry.create(&project).await.unwrap();

        registry
            .fail_stage(&id, Stage::Transcribe, "speech service unreachable")
            .await
            .unwrap();

        let p = registry.require(&id).await.unwrap();
        assert_eq!(p.status, ProjectStatus::Failed);
        assert_eq!(p.error.as_deref(), Some("speech service unreachable"));
        assert_eq!(
            p.step_record(Stage::Transcribe).unwrap().error.as_deref(),
            Some("speech service unreachable")
        );
    }

    #[tokio::test]
    async fn reboot_reset_clears_bookkeeping() {
        let registry = MemoryRegistry::new();
        let mut project = Project::new("demo", "video_demo", RecordingConfig::default());
        project.status = ProjectStatus::Completed;
        project.progress = 100;
        let id = project.id.clone();
        registry.create(&project).await.unwrap();
        registry.begin_stage(&id, Stage::Seo).await.unwrap();

        registry.reset_for_reboot(&id).await.unwrap();

        let p = registry.require(&id).await.unwrap();
        assert_eq!(p.status, ProjectStatus::Created);
        assert_eq!(p.current_step, 0);
        assert_eq!(p.progress, 0);
        assert!(p.steps.is_empty());
        assert!(p.error.is_none());
    }
}
