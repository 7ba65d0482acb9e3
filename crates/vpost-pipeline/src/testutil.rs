//! Shared fixtures for stage-body tests.

use std::sync::Arc;

use tempfile::TempDir;

use vpost_models::{Project, ProjectId, RecordingConfig, Transcription};
use vpost_registry::{MemoryRegistry, ProjectRegistry};
use vpost_services::{
    StubImageGenerator, StubLanguageModel, StubSpeechToText, StubStockVideo, StubVideoHost,
};

use crate::artifact::ArtifactDir;
use crate::context::{PipelineSettings, Services, StageContext};
use crate::schedule_policy::SchedulePolicy;

pub fn stub_services() -> Services {
    Services {
        speech: Arc::new(StubSpeechToText {
            transcription: Transcription {
                text: String::new(),
                segments: vec![],
                language: "en".to_string(),
                duration: 0.0,
            },
        }),
        llm: Arc::new(StubLanguageModel::default()),
        stock: Arc::new(StubStockVideo::default()),
        host: Arc::new(StubVideoHost::default()),
        images: Arc::new(StubImageGenerator::default()),
    }
}

pub fn test_context(registry: Arc<MemoryRegistry>) -> StageContext {
    StageContext {
        registry,
        services: stub_services(),
        blob_store: None,
        settings: PipelineSettings::default(),
        schedule_policy: SchedulePolicy::default(),
        cancel_rx: None,
    }
}

/// Fresh registry + project + empty artifact directory.
pub async fn project_fixture(folder: &str) -> (TempDir, ArtifactDir, Arc<MemoryRegistry>, ProjectId)
{
    let tmp = TempDir::new().unwrap();
    let dir = ArtifactDir::new(tmp.path().join(folder));
    dir.create().await.unwrap();

    let registry = Arc::new(MemoryRegistry::new());
    let project = Project::new("demo", folder, RecordingConfig::default());
    let id = project.id.clone();
    registry.create(&project).await.unwrap();

    (tmp, dir, registry, id)
}
