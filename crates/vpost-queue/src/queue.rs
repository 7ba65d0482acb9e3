//! Redis Streams broker implementation.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vpost_models::ChainHandle;

use crate::broker::Broker;
use crate::error::{QueueError, QueueResult};
use crate::job::StageJob;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct RedisBrokerConfig {
    pub redis_url: String,
    /// Stream name for stage jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter stream
    pub dlq_stream_name: String,
    /// Completion records and revocation tombstones live this long
    pub result_retention: Duration,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vpost:stages".to_string(),
            consumer_group: "vpost:workers".to_string(),
            dlq_stream_name: "vpost:dlq".to_string(),
            result_retention: Duration::from_secs(86400),
        }
    }
}

impl RedisBrokerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vpost:stages".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vpost:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "vpost:dlq".to_string()),
            result_retention: Duration::from_secs(
                std::env::var("QUEUE_RESULT_RETENTION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(86400),
            ),
        }
    }
}

/// Durable broker over Redis Streams with a consumer group.
pub struct RedisBroker {
    client: redis::Client,
    config: RedisBrokerConfig,
}

impl RedisBroker {
    pub fn new(config: RedisBrokerConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(RedisBrokerConfig::from_env())
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn revoked_key(&self, handle: &ChainHandle) -> String {
        format!("vpost:revoked:{handle}")
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }
        Ok(())
    }

    /// Consume new stage jobs for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, StageJob)>> {
        let mut conn = self.connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    match serde_json::from_slice::<StageJob>(payload) {
                        Ok(job) => jobs.push((message_id, job)),
                        Err(e) => {
                            warn!("Dropping malformed stage job payload: {e}");
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }
        Ok(jobs)
    }

    /// Acknowledge and delete a message.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        counter!("vpost_queue_acked").increment(1);
        debug!("acked stage job {message_id}");
        Ok(())
    }

    /// Clear the idempotency key so the same stage can be resubmitted.
    pub async fn clear_dedup(&self, job: &StageJob) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let dedup_key = format!("vpost:dedup:{}", job.idempotency_key());
        conn.del::<_, ()>(&dedup_key).await?;
        Ok(())
    }

    /// Record a terminal failure on the dead-letter stream and ack.
    ///
    /// There is no broker-level retry for stage jobs: rerunning an hour-long
    /// encode on a deterministic failure is wasteful. Users resume with a
    /// partial chain.
    pub async fn dead_letter(
        &self,
        message_id: &str,
        job: &StageJob,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;
        self.clear_dedup(job).await?;

        counter!("vpost_queue_dead_lettered").increment(1);
        warn!("stage job {} dead-lettered: {error}", job.job_id);
        Ok(())
    }

    /// Record a completion for diagnostics; expires with result retention.
    pub async fn record_result(&self, job: &StageJob, success: bool) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = format!("vpost:result:{}", job.job_id);
        let value = serde_json::json!({
            "project_id": job.project_id,
            "stage": job.stage,
            "success": success,
        })
        .to_string();
        conn.set_ex::<_, _, ()>(&key, value, self.config.result_retention.as_secs())
            .await?;
        Ok(())
    }

    /// Claim messages whose consumer died (reject-on-worker-lost).
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, StageJob)>> {
        let mut conn = self.connection().await?;

        // XAUTOCLAIM scans the pending list and transfers ownership of
        // entries idle past the threshold in one round trip.
        let reply: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        // Reply shape: [next_cursor, [[id, [field, value, ...]], ...], deleted]
        if let redis::Value::Array(items) = reply {
            if let Some(redis::Value::Array(entries)) = items.get(1) {
                for entry in entries {
                    let redis::Value::Array(pair) = entry else { continue };
                    let (Some(redis::Value::BulkString(id)), Some(redis::Value::Array(fields))) =
                        (pair.first(), pair.get(1))
                    else {
                        continue;
                    };
                    let message_id = String::from_utf8_lossy(id).to_string();

                    let mut payload: Option<Vec<u8>> = None;
                    let mut i = 0;
                    while i + 1 < fields.len() {
                        if let (
                            redis::Value::BulkString(field),
                            redis::Value::BulkString(value),
                        ) = (&fields[i], &fields[i + 1])
                        {
                            if field.as_slice() == b"job" {
                                payload = Some(value.clone());
                                break;
                            }
                        }
                        i += 2;
                    }

                    if let Some(payload) = payload {
                        match serde_json::from_slice::<StageJob>(&payload) {
                            Ok(job) => {
                                info!("claimed orphaned stage job {}", job.job_id);
                                jobs.push((message_id, job));
                            }
                            Err(e) => {
                                warn!("dropping malformed claimed payload: {e}");
                                self.ack(&message_id).await.ok();
                            }
                        }
                    }
                }
            }
        }
        Ok(jobs)
    }

    /// Reset a message's idle timer while its stage is still running.
    pub async fn refresh_visibility(
        &self,
        consumer_name: &str,
        message_id: &str,
    ) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _res: redis::Value = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(0)
            .arg(message_id)
            .arg("JUSTID")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Queue length, for diagnostics.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn submit(&self, job: StageJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();

        // Reject duplicates of the same (project, stage, chain) invocation
        let dedup_key = format!("vpost:dedup:{idempotency_key}");
        let exists: bool = conn.exists(&dedup_key).await?;
        if exists {
            warn!("duplicate stage job rejected: {idempotency_key}");
            return Err(QueueError::enqueue_failed("duplicate stage job"));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await?;

        conn.set_ex::<_, _, ()>(&dedup_key, "1", 3600).await?;

        counter!("vpost_queue_submitted").increment(1);
        info!(
            job_id = %job.job_id,
            stage = %job.stage,
            "enqueued stage job as {message_id}"
        );
        Ok(message_id)
    }

    async fn revoke(&self, handle: &ChainHandle) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(
            self.revoked_key(handle),
            "1",
            self.config.result_retention.as_secs(),
        )
        .await?;
        info!("revoked chain {handle}");
        Ok(())
    }

    async fn is_revoked(&self, handle: &ChainHandle) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        Ok(conn.exists(self.revoked_key(handle)).await?)
    }
}
