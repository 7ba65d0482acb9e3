//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] vpost_pipeline::PipelineError),

    #[error("Queue error: {0}")]
    Queue(#[from] vpost_queue::QueueError),

    #[error("Registry error: {0}")]
    Registry(#[from] vpost_registry::RegistryError),

    #[error("Service error: {0}")]
    Service(#[from] vpost_services::ServiceError),

    #[error("Storage error: {0}")]
    Storage(#[from] vpost_storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
