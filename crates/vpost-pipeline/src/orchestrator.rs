//! Pipeline orchestrator.
//!
//! Translates user intents into broker submissions and drives the project
//! status machine. Submitting a new chain stores its handle first, then
//! revokes the superseded one; a stage still running under the old handle
//! sees the mismatch in the registry and stands down without writes.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use vpost_models::{ChainHandle, Project, ProjectId, ProjectStatus, Stage};
use vpost_queue::{Broker, StageJob};
use vpost_registry::ProjectRegistry;

use crate::artifact::{names, ArtifactDir};
use crate::error::{PipelineError, PipelineResult};

pub struct Orchestrator {
    registry: Arc<dyn ProjectRegistry>,
    broker: Arc<dyn Broker>,
    /// Shared output root holding one artifact directory per project
    artifact_root: PathBuf,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn ProjectRegistry>,
        broker: Arc<dyn Broker>,
        artifact_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            broker,
            artifact_root: artifact_root.into(),
        }
    }

    fn artifact_dir(&self, project: &Project) -> ArtifactDir {
        ArtifactDir::from_base(&self.artifact_root, &project.folder_name)
    }

    /// Submit the automatic pipeline: stages 0..=10, or 1..=10 when the
    /// project arrived canvas-composited. Execution stops at scheduling;
    /// publication is always a separate submission.
    pub async fn submit_full(&self, project_id: &ProjectId) -> PipelineResult<ChainHandle> {
        let project = self.registry.require(project_id).await?;
        let dir = self.artifact_dir(&project);

        let start = if dir.exists(names::COMBINED) {
            Stage::Compose
        } else {
            Stage::Normalize
        };
        let chain = Stage::chain(start, Stage::Schedule);
        self.submit_chain(&project, &chain).await
    }

    /// Resume or re-run an arbitrary stage range.
    pub async fn submit_partial(
        &self,
        project_id: &ProjectId,
        start: Stage,
        end: Stage,
    ) -> PipelineResult<ChainHandle> {
        let project = self.registry.require(project_id).await?;
        let chain = Stage::chain(start, end);
        if chain.is_empty() {
            return Err(PipelineError::invalid_state(format!(
                "empty stage range {start}..{end}"
            )));
        }
        // Publication stays user-gated even inside a partial range.
        if chain.contains(&Stage::Publish) && !project.status.allows_publication() {
            return Err(PipelineError::invalid_state(format!(
                "publication not allowed from status {}",
                project.status
            )));
        }
        self.submit_chain(&project, &chain).await
    }

    /// Submit the publication stage alone. Permitted only once the
    /// automatic pipeline has handed off (or after a failed attempt).
    pub async fn submit_publication(&self, project_id: &ProjectId) -> PipelineResult<ChainHandle> {
        let project = self.registry.require(project_id).await?;
        if !project.status.allows_publication() {
            return Err(PipelineError::invalid_state(format!(
                "publication not allowed from status {}",
                project.status
            )));
        }
        self.submit_chain(&project, &[Stage::Publish]).await
    }

    /// Terminate the project's current chain, keeping every artifact.
    pub async fn revoke(&self, project_id: &ProjectId) -> PipelineResult<()> {
        let project = self.registry.require(project_id).await?;
        if let Some(handle) = &project.task_handle {
            self.broker.revoke(handle).await?;
            info!(project_id = %project_id, handle = %handle, "chain revoked");
        }
        self.registry
            .set_status(project_id, ProjectStatus::Stopped)
            .await?;
        Ok(())
    }

    /// Destructive restart: revoke, trim the artifact directory to the seed
    /// set, reset bookkeeping, then run the full pipeline again.
    pub async fn reboot(&self, project_id: &ProjectId) -> PipelineResult<ChainHandle> {
        let project = self.registry.require(project_id).await?;

        if let Some(handle) = &project.task_handle {
            self.broker.revoke(handle).await?;
        }

        let dir = self.artifact_dir(&project);
        let deleted = dir.reset_to_seed().await?;
        info!(
            project_id = %project_id,
            deleted = deleted.len(),
            "artifact directory trimmed to seed set"
        );

        self.registry.reset_for_reboot(project_id).await?;
        self.submit_full(project_id).await
    }

    async fn submit_chain(&self, project: &Project, chain: &[Stage]) -> PipelineResult<ChainHandle> {
        let handle = ChainHandle::new();
        let job = StageJob::chain_root(
            project.id.clone(),
            project.folder_name.clone(),
            chain,
            handle.clone(),
        )
        .ok_or_else(|| PipelineError::invalid_state("empty chain"))?;

        let first = chain[0];
        let previous = project.task_handle.clone();

        // Store the new handle before revoking the old one: a stage still
        // running under the previous handle must observe the mismatch as
        // soon as possible.
        self.registry
            .update_fields(
                &project.id,
                vec![
                    ("task_handle".to_string(), json!(handle)),
                    ("status".to_string(), json!(ProjectStatus::Processing)),
                    ("current_step".to_string(), json!(first.index())),
                    ("step_name".to_string(), json!(first.label())),
                    (
                        "progress".to_string(),
                        json!(Project::progress_for_step(first.index())),
                    ),
                    ("error".to_string(), serde_json::Value::Null),
                ],
            )
            .await?;

        if let Some(previous) = previous {
            if previous != handle {
                self.broker.revoke(&previous).await?;
            }
        }

        self.broker.submit(job).await?;
        info!(
            project_id = %project.id,
            chain_len = chain.len(),
            first_stage = %first,
            handle = %handle,
            "chain submitted"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vpost_models::RecordingConfig;
    use vpost_queue::MemoryBroker;
    use vpost_registry::MemoryRegistry;

    async fn setup() -> (
        TempDir,
        Arc<MemoryRegistry>,
        Arc<MemoryBroker>,
        Orchestrator,
        ProjectId,
    ) {
        let tmp = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let broker = Arc::new(MemoryBroker::new());
        let orchestrator = Orchestrator::new(registry.clone(), broker.clone(), tmp.path());

        let mut project = Project::new("demo", "video_x", RecordingConfig::default());
        project.status = ProjectStatus::Converting;
        let id = project.id.clone();
        registry.create(&project).await.unwrap();

        let dir = ArtifactDir::from_base(tmp.path(), "video_x");
        dir.create().await.unwrap();
        dir.write_bytes(names::SCREEN, b"v").await.unwrap();
        dir.write_bytes(names::WEBCAM, b"v").await.unwrap();
        dir.write_string(names::CONFIG, "{}").await.unwrap();

        (tmp, registry, broker, orchestrator, id)
    }

    #[tokio::test]
    async fn full_submission_builds_the_automatic_chain() {
        let (_tmp, registry, broker, orchestrator, id) = setup().await;

        let handle = orchestrator.submit_full(&id).await.unwrap();

        let jobs = broker.submissions();
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.stage, Stage::Normalize);
        assert_eq!(job.remaining.len(), 10);
        assert_eq!(*job.remaining.last().unwrap(), Stage::Schedule);
        assert!(!job.remaining.contains(&Stage::Publish));
        assert_eq!(job.handle, handle);

        let project = registry.require(&id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Processing);
        assert_eq!(project.current_step, 0);
        assert_eq!(project.task_handle, Some(handle));
    }

    #[tokio::test]
    async fn canvas_projects_skip_normalization() {
        let (tmp, _registry, broker, orchestrator, id) = setup().await;
        let dir = ArtifactDir::from_base(tmp.path(), "video_x");
        tokio::fs::remove_file(dir.path(names::SCREEN)).await.unwrap();
        tokio::fs::remove_file(dir.path(names::WEBCAM)).await.unwrap();
        dir.write_bytes(names::COMBINED, b"v").await.unwrap();

        orchestrator.submit_full(&id).await.unwrap();

        let jobs = broker.submissions();
        assert_eq!(jobs[0].stage, Stage::Compose);
    }

    #[tokio::test]
    async fn resubmission_revokes_the_previous_handle() {
        let (_tmp, _registry, broker, orchestrator, id) = setup().await;

        let first = orchestrator.submit_full(&id).await.unwrap();
        let second = orchestrator
            .submit_partial(&id, Stage::SilenceTrim, Stage::Schedule)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(broker.revoked_handles().contains(&first.to_string()));
        assert!(!broker.revoked_handles().contains(&second.to_string()));
    }

    #[tokio::test]
    async fn publication_is_gated_on_status() {
        let (_tmp, registry, broker, orchestrator, id) = setup().await;

        let err = orchestrator.submit_publication(&id).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));

        registry
            .set_status(&id, ProjectStatus::ReadyToUpload)
            .await
            .unwrap();
        orchestrator.submit_publication(&id).await.unwrap();

        let jobs = broker.submissions();
        let last = jobs.last().unwrap();
        assert_eq!(last.stage, Stage::Publish);
        assert!(last.remaining.is_empty());
    }

    #[tokio::test]
    async fn revoke_stops_and_preserves_artifacts() {
        let (tmp, registry, broker, orchestrator, id) = setup().await;
        let handle = orchestrator.submit_full(&id).await.unwrap();

        orchestrator.revoke(&id).await.unwrap();

        assert!(broker.revoked_handles().contains(&handle.to_string()));
        let project = registry.require(&id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Stopped);

        let dir = ArtifactDir::from_base(tmp.path(), "video_x");
        assert!(dir.exists(names::SCREEN));
    }

    #[tokio::test]
    async fn reboot_trims_resets_and_resubmits() {
        let (tmp, registry, broker, orchestrator, id) = setup().await;
        let dir = ArtifactDir::from_base(tmp.path(), "video_x");
        dir.write_bytes(names::ORIGINAL, b"v").await.unwrap();
        dir.write_bytes(names::NOSILENCE, b"v").await.unwrap();

        let first = orchestrator.submit_full(&id).await.unwrap();
        let second = orchestrator.reboot(&id).await.unwrap();

        assert_ne!(first, second);
        assert!(broker.revoked_handles().contains(&first.to_string()));

        // Seed files survive, derived artifacts are gone.
        assert!(dir.exists(names::CONFIG));
        assert!(dir.exists(names::SCREEN));
        assert!(dir.exists(names::WEBCAM));
        assert!(!dir.exists(names::ORIGINAL));
        assert!(!dir.exists(names::NOSILENCE));

        let project = registry.require(&id).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Processing);
        assert_eq!(project.current_step, 0);
        assert_eq!(project.task_handle, Some(second));
        assert!(project.steps.is_empty());
    }
}
