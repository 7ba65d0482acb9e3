//! Stage worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpost_pipeline::{PipelineSettings, SchedulePolicy, Services, StageContext};
use vpost_queue::RedisBroker;
use vpost_registry::RedisRegistry;
use vpost_services::{ChatClient, ImageGenClient, PexelsClient, UploaderClient, WhisperClient};
use vpost_storage::BlobStore;
use vpost_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("vpost=info".parse().expect("valid directive")))
        .init();

    info!("starting vpost-worker");

    let config = WorkerConfig::from_env();
    info!("worker config: {:?}", config);

    let context = match build_context() {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("failed to build stage context: {e}");
            std::process::exit(1);
        }
    };

    let broker = match RedisBroker::from_env() {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("failed to create broker: {e}");
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, broker, context));

    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("executor error: {e}");
        std::process::exit(1);
    }

    info!("worker shutdown complete");
}

fn build_context() -> Result<StageContext, Box<dyn std::error::Error>> {
    let registry = Arc::new(RedisRegistry::from_env()?);

    let services = Services {
        speech: Arc::new(WhisperClient::from_env()?),
        llm: Arc::new(ChatClient::from_env()?),
        stock: Arc::new(PexelsClient::from_env()?),
        host: Arc::new(UploaderClient::from_env()?),
        images: Arc::new(ImageGenClient::from_env()?),
    };

    // Mirroring is optional; a deployment without blob credentials still
    // runs the full pipeline.
    let blob_store = match BlobStore::from_env() {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("blob store disabled: {e}");
            None
        }
    };

    Ok(StageContext {
        registry,
        services,
        blob_store,
        settings: PipelineSettings::from_env(),
        schedule_policy: SchedulePolicy::from_env(),
        cancel_rx: None,
    })
}
