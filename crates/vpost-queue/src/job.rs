//! Stage invocation payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vpost_models::{ChainHandle, JobId, ProjectId, Stage};

/// One stage invocation on the broker.
///
/// `remaining` is the continuation: the stages still to run after this one,
/// in order. The executing worker publishes `next()` on success; a failure
/// short-circuits the rest of the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageJob {
    pub job_id: JobId,
    pub project_id: ProjectId,
    /// Artifact directory base name
    pub folder_name: String,
    pub stage: Stage,
    #[serde(default)]
    pub remaining: Vec<Stage>,
    /// Root handle of the chain this invocation belongs to
    pub handle: ChainHandle,
    pub submitted_at: DateTime<Utc>,
}

impl StageJob {
    /// Root job of a chain. None for an empty chain.
    pub fn chain_root(
        project_id: ProjectId,
        folder_name: impl Into<String>,
        chain: &[Stage],
        handle: ChainHandle,
    ) -> Option<Self> {
        let (first, rest) = chain.split_first()?;
        Some(Self {
            job_id: JobId::new(),
            project_id,
            folder_name: folder_name.into(),
            stage: *first,
            remaining: rest.to_vec(),
            handle,
            submitted_at: Utc::now(),
        })
    }

    /// Continuation job for the next stage, carrying the same handle.
    pub fn next(&self) -> Option<Self> {
        let (next_stage, rest) = self.remaining.split_first()?;
        Some(Self {
            job_id: JobId::new(),
            project_id: self.project_id.clone(),
            folder_name: self.folder_name.clone(),
            stage: *next_stage,
            remaining: rest.to_vec(),
            handle: self.handle.clone(),
            submitted_at: Utc::now(),
        })
    }

    /// Deduplication key: one invocation of a stage per chain.
    pub fn idempotency_key(&self) -> String {
        format!("stage:{}:{}:{}", self.project_id, self.stage, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_root_and_continuation_walk_the_chain() {
        let chain = Stage::chain(Stage::Normalize, Stage::SilenceTrim);
        let handle = ChainHandle::new();
        let root =
            StageJob::chain_root(ProjectId::new(), "video_x", &chain, handle.clone()).unwrap();

        assert_eq!(root.stage, Stage::Normalize);
        assert_eq!(root.remaining, vec![Stage::Compose, Stage::SilenceTrim]);

        let second = root.next().unwrap();
        assert_eq!(second.stage, Stage::Compose);
        assert_eq!(second.handle, handle);
        assert_ne!(second.job_id, root.job_id);

        let third = second.next().unwrap();
        assert_eq!(third.stage, Stage::SilenceTrim);
        assert!(third.next().is_none());
    }

    #[test]
    fn empty_chain_has_no_root() {
        assert!(StageJob::chain_root(ProjectId::new(), "v", &[], ChainHandle::new()).is_none());
    }

    #[test]
    fn serde_round_trip() {
        let job = StageJob::chain_root(
            ProjectId::new(),
            "video_x",
            &[Stage::Publish],
            ChainHandle::new(),
        )
        .unwrap();
        let json = serde_json::to_string(&job).unwrap();
        let back: StageJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage, Stage::Publish);
        assert_eq!(back.job_id, job.job_id);
        assert!(back.remaining.is_empty());
    }
}
