//! S3-compatible blob store.
//!
//! This crate provides:
//! - A thin client over an S3-compatible endpoint
//! - The mirror operation the scheduling stage uses to copy a whole
//!   artifact directory into long-term storage

pub mod client;
pub mod error;
pub mod operations;

pub use client::{BlobStore, BlobStoreConfig};
pub use error::{StorageError, StorageResult};
pub use operations::content_type_for;
