//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A declared stage input is absent; fatal for the chain.
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Media error: {0}")]
    Media(#[from] vpost_media::MediaError),

    #[error("Registry error: {0}")]
    Registry(#[from] vpost_registry::RegistryError),

    #[error("Service error: {0}")]
    Service(#[from] vpost_services::ServiceError),

    #[error("Queue error: {0}")]
    Queue(#[from] vpost_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] vpost_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_input(name: impl Into<String>) -> Self {
        Self::MissingInput(name.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// A revoked chain's kill shows up as a cancelled encoder run.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Media(vpost_media::MediaError::Cancelled))
    }
}
