//! Job executor: the consume/execute/chain loop.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vpost_pipeline::{run_stage, ArtifactDir, StageContext};
use vpost_queue::{Broker, QueueError, RedisBroker, StageJob};
use vpost_registry::ProjectRegistry;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Consumes stage invocations and runs stage bodies.
pub struct JobExecutor {
    config: WorkerConfig,
    broker: Arc<RedisBroker>,
    /// Context template; each job gets a clone wired to its own
    /// cancellation channel
    context: StageContext,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, broker: Arc<RedisBroker>, context: StageContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            broker,
            context,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            slots = self.config.max_concurrent_jobs,
            "starting stage executor"
        );
        self.broker.init().await?;

        // Periodically adopt messages whose worker died.
        let claim_task = self.spawn_claim_loop();

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!("consume error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        info!("draining in-flight stages");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;
        info!("stage executor stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn spawn_claim_loop(&self) -> tokio::task::JoinHandle<()> {
        let broker = Arc::clone(&self.broker);
        let context = self.context.clone();
        let config = self.config.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer = self.consumer_name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let min_idle_ms = config.claim_min_idle.as_millis() as u64;
                        match broker.claim_pending(&consumer, min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("claimed {} orphaned stage jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let Ok(permit) =
                                        Arc::clone(&semaphore).acquire_owned().await
                                    else {
                                        return;
                                    };
                                    let broker = Arc::clone(&broker);
                                    let context = context.clone();
                                    let config = config.clone();
                                    let consumer = consumer.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        execute_job(broker, context, config, consumer, message_id, job)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("claim scan failed: {e}"),
                        }
                    }
                }
            }
        })
    }

    async fn consume_once(&self) -> WorkerResult<()> {
        if self.job_semaphore.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        // Prefetch exactly one: a long-running encode must not sit on
        // messages a sibling could take.
        let jobs = self.broker.consume(&self.consumer_name, 1000, 1).await?;

        for (message_id, job) in jobs {
            let Ok(permit) = Arc::clone(&self.job_semaphore).acquire_owned().await else {
                break;
            };
            let broker = Arc::clone(&self.broker);
            let context = self.context.clone();
            let config = self.config.clone();
            let consumer = self.consumer_name.clone();
            tokio::spawn(async move {
                let _permit = permit;
                execute_job(broker, context, config, consumer, message_id, job).await;
            });
        }
        Ok(())
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Execute one stage invocation end to end.
async fn execute_job(
    broker: Arc<RedisBroker>,
    context: StageContext,
    config: WorkerConfig,
    consumer: String,
    message_id: String,
    job: StageJob,
) {
    let registry = Arc::clone(&context.registry);

    // A revoked chain stands down without touching the registry or the
    // artifact directory.
    match broker.is_revoked(&job.handle).await {
        Ok(true) => {
            debug!(job_id = %job.job_id, "chain revoked, standing down");
            broker.ack(&message_id).await.ok();
            broker.clear_dedup(&job).await.ok();
            return;
        }
        Ok(false) => {}
        Err(e) => {
            warn!("revocation check failed, leaving message pending: {e}");
            return;
        }
    }

    // A superseded handle means a newer chain owns this project now.
    let project = match registry.get(&job.project_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            warn!(project_id = %job.project_id, "project record gone, dropping job");
            broker
                .dead_letter(&message_id, &job, "project not found")
                .await
                .ok();
            return;
        }
        Err(e) => {
            warn!("registry unavailable, leaving message pending: {e}");
            return;
        }
    };
    if project.task_handle.as_ref() != Some(&job.handle) {
        debug!(job_id = %job.job_id, "handle superseded, standing down");
        broker.ack(&message_id).await.ok();
        broker.clear_dedup(&job).await.ok();
        return;
    }

    info!(
        job_id = %job.job_id,
        project_id = %job.project_id,
        stage = %job.stage,
        "executing stage"
    );
    if let Err(e) = registry.begin_stage(&job.project_id, job.stage).await {
        warn!("stage-entry bookkeeping failed, leaving message pending: {e}");
        return;
    }

    // Wire this job's cancellation into the media runner; flip it on
    // revocation or when the soft ceiling passes.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut ctx = context.clone();
    ctx.cancel_rx = Some(cancel_rx);

    let monitor = spawn_monitor(
        Arc::clone(&broker),
        consumer.clone(),
        message_id.clone(),
        job.handle.clone(),
        config.clone(),
        cancel_tx,
    );

    let dir = ArtifactDir::from_base(&config.artifact_root, &job.folder_name);
    let result = tokio::time::timeout(
        config.hard_timeout,
        run_stage(&ctx, &job.project_id, &dir, job.stage),
    )
    .await;
    monitor.abort();

    match result {
        Ok(Ok(())) => {
            counter!("vpost_stages_completed").increment(1);
            info!(job_id = %job.job_id, stage = %job.stage, "stage completed");

            if let Err(e) = registry.complete_stage(&job.project_id, job.stage).await {
                error!("stage-exit bookkeeping failed: {e}");
            }
            broker.record_result(&job, true).await.ok();
            broker.ack(&message_id).await.ok();
            broker.clear_dedup(&job).await.ok();

            // Chain continuation: the next stage's invocation is this
            // stage's return value. A revocation that landed mid-stage
            // stops the chain here.
            if broker.is_revoked(&job.handle).await.unwrap_or(false) {
                info!(job_id = %job.job_id, "chain revoked mid-stage, not continuing");
                return;
            }
            if let Some(next) = job.next() {
                match broker.submit(next).await {
                    Ok(_) => {}
                    Err(QueueError::EnqueueFailed(_)) => {
                        warn!("continuation already enqueued, skipping");
                    }
                    Err(e) => {
                        error!("failed to enqueue continuation: {e}");
                        registry
                            .fail_stage(
                                &job.project_id,
                                job.stage,
                                &format!("continuation submission failed: {e}"),
                            )
                            .await
                            .ok();
                    }
                }
            }
        }
        Ok(Err(e)) if e.is_cancellation() => {
            let revoked = broker.is_revoked(&job.handle).await.unwrap_or(false);
            broker.ack(&message_id).await.ok();
            broker.clear_dedup(&job).await.ok();
            broker.record_result(&job, false).await.ok();
            if revoked {
                // Revocation exits without status updates; the orchestrator
                // already marked the project stopped.
                info!(job_id = %job.job_id, "stage cancelled by revocation");
            } else {
                let message = format!(
                    "stage exceeded the soft time limit ({}s)",
                    config.soft_timeout.as_secs()
                );
                error!(job_id = %job.job_id, "{message}");
                registry
                    .fail_stage(&job.project_id, job.stage, &message)
                    .await
                    .ok();
            }
        }
        Ok(Err(e)) => {
            counter!("vpost_stages_failed").increment(1);
            let message = e.to_string();
            error!(job_id = %job.job_id, stage = %job.stage, "stage failed: {message}");
            registry
                .fail_stage(&job.project_id, job.stage, &message)
                .await
                .ok();
            broker.record_result(&job, false).await.ok();
            broker.dead_letter(&message_id, &job, &message).await.ok();
        }
        Err(_elapsed) => {
            counter!("vpost_stages_failed").increment(1);
            let message = format!(
                "stage timed out after {}s",
                config.hard_timeout.as_secs()
            );
            error!(job_id = %job.job_id, stage = %job.stage, "{message}");
            registry
                .fail_stage(&job.project_id, job.stage, &message)
                .await
                .ok();
            broker.record_result(&job, false).await.ok();
            broker.dead_letter(&message_id, &job, &message).await.ok();
        }
    }
}

/// Heartbeat + revocation watch + soft time limit for one running stage.
fn spawn_monitor(
    broker: Arc<RedisBroker>,
    consumer: String,
    message_id: String,
    handle: vpost_models::ChainHandle,
    config: WorkerConfig,
    cancel_tx: watch::Sender<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let soft_deadline = tokio::time::sleep(config.soft_timeout);
        tokio::pin!(soft_deadline);
        let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
        let mut revocation_poll = tokio::time::interval(Duration::from_secs(5));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = broker.refresh_visibility(&consumer, &message_id).await {
                        debug!("visibility refresh failed: {e}");
                    }
                }
                _ = revocation_poll.tick() => {
                    if broker.is_revoked(&handle).await.unwrap_or(false) {
                        info!("revocation observed, cancelling stage");
                        let _ = cancel_tx.send(true);
                        return;
                    }
                }
                _ = &mut soft_deadline => {
                    warn!(
                        "soft time limit ({}s) passed, asking stage to wind down",
                        config.soft_timeout.as_secs()
                    );
                    let _ = cancel_tx.send(true);
                    return;
                }
            }
        }
    })
}
