//! Stage worker: consumes stage invocations from the broker, executes
//! stage bodies, and publishes chain continuations.

pub mod config;
pub mod error;
pub mod executor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
