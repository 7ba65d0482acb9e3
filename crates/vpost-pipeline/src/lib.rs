//! Stage library and pipeline orchestrator.
//!
//! Twelve stage bodies communicate solely through a per-project artifact
//! directory and the project registry. The orchestrator turns user intents
//! (full run, partial resume, publication, revoke, reboot) into broker
//! submissions.

pub mod artifact;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod schedule_policy;
pub mod stages;

#[cfg(test)]
pub(crate) mod testutil;

pub use artifact::{names, ArtifactDir, SEED_FILES};
pub use context::{PipelineSettings, Services, StageContext};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use schedule_policy::SchedulePolicy;
pub use stages::run_stage;
