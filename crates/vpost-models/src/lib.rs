//! Shared data models for the VPost backend.
//!
//! This crate provides Serde-serializable types for:
//! - Project records, statuses and per-stage bookkeeping
//! - The stage enum and chain construction
//! - Recording/compositing configuration (config.json)
//! - Artifact side-file documents (segments, transcription, shorts,
//!   b-roll, seo, schedule)
//! - Typed identifiers for projects, jobs and chains

pub mod broll;
pub mod config;
pub mod ids;
pub mod project;
pub mod schedule;
pub mod segments;
pub mod seo;
pub mod shorts;
pub mod stage;
pub mod transcript;

// Re-export common types
pub use broll::{BrollClip, BrollSuggestion};
pub use config::{LayoutSwitch, OverlayLayout, RecordingConfig, SwitchLayout, WebcamShape};
pub use ids::{ChainHandle, JobId, ProjectId};
pub use project::{OutputManifest, Project, ProjectStatus, StepRecord, StepStatus};
pub use schedule::{
    Privacy, Schedule, ScheduledUpload, UploadError, UploadKind, UploadResult, UploadResults,
};
pub use segments::{SegmentsFile, TimeSpan};
pub use seo::{MainVideoSeo, SeoFile, ShortSeo};
pub use shorts::ShortSuggestion;
pub use stage::{Stage, TOTAL_STEPS};
pub use transcript::{TranscriptSegment, Transcription};
