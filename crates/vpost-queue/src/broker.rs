//! The broker surface the orchestrator depends on.

use async_trait::async_trait;

use vpost_models::ChainHandle;

use crate::error::QueueResult;
use crate::job::StageJob;

/// Submit chains, revoke by handle.
///
/// Consumption, acknowledgment and pending-claim live on the concrete
/// broker; only workers use those.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Enqueue a stage invocation. Returns the broker message id.
    async fn submit(&self, job: StageJob) -> QueueResult<String>;

    /// Tombstone a chain so in-flight and queued stages stand down.
    async fn revoke(&self, handle: &ChainHandle) -> QueueResult<()>;

    /// Whether a chain has been revoked.
    async fn is_revoked(&self, handle: &ChainHandle) -> QueueResult<bool>;
}
