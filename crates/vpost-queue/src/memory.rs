//! In-memory broker double for orchestrator tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use vpost_models::ChainHandle;

use crate::broker::Broker;
use crate::error::QueueResult;
use crate::job::StageJob;

/// Records submissions and revocations instead of queueing them.
#[derive(Default)]
pub struct MemoryBroker {
    pub submitted: Mutex<Vec<StageJob>>,
    revoked: Mutex<HashSet<String>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs submitted so far, oldest first.
    pub fn submissions(&self) -> Vec<StageJob> {
        self.submitted.lock().expect("broker lock").clone()
    }

    pub fn revoked_handles(&self) -> Vec<String> {
        self.revoked
            .lock()
            .expect("broker lock")
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn submit(&self, job: StageJob) -> QueueResult<String> {
        let mut submitted = self.submitted.lock().expect("broker lock");
        submitted.push(job);
        Ok(format!("mem-{}", submitted.len()))
    }

    async fn revoke(&self, handle: &ChainHandle) -> QueueResult<()> {
        self.revoked
            .lock()
            .expect("broker lock")
            .insert(handle.to_string());
        Ok(())
    }

    async fn is_revoked(&self, handle: &ChainHandle) -> QueueResult<bool> {
        Ok(self
            .revoked
            .lock()
            .expect("broker lock")
            .contains(handle.as_str()))
    }
}
