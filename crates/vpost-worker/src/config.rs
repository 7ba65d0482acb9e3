//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
///
/// Stages are media-heavy: two at a time per worker, one message fetched at
/// a time so a long encode never starves a sibling worker's queue position.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent stage executions
    pub max_concurrent_jobs: usize,
    /// Hard per-stage ceiling; exceeding it fails the stage
    pub hard_timeout: Duration,
    /// Soft ceiling; the stage is asked to wind down
    pub soft_timeout: Duration,
    /// Shared output root holding the artifact directories
    pub artifact_root: PathBuf,
    /// How often to scan for orphaned pending messages
    pub claim_interval: Duration,
    /// Idle time before an orphaned message may be claimed
    pub claim_min_idle: Duration,
    /// Ownership refresh cadence for in-flight stages
    pub heartbeat_interval: Duration,
    /// Graceful shutdown drain window
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            hard_timeout: Duration::from_secs(3600),
            soft_timeout: Duration::from_secs(3000),
            artifact_root: PathBuf::from("output"),
            claim_interval: Duration::from_secs(60),
            // Encodes legitimately run for many minutes; claiming too early
            // duplicates in-progress work.
            claim_min_idle: Duration::from_secs(1800),
            heartbeat_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", defaults.max_concurrent_jobs),
            hard_timeout: Duration::from_secs(env_parse(
                "WORKER_HARD_TIMEOUT",
                defaults.hard_timeout.as_secs(),
            )),
            soft_timeout: Duration::from_secs(env_parse(
                "WORKER_SOFT_TIMEOUT",
                defaults.soft_timeout.as_secs(),
            )),
            artifact_root: std::env::var("ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_root),
            claim_interval: Duration::from_secs(env_parse(
                "WORKER_CLAIM_INTERVAL_SECS",
                defaults.claim_interval.as_secs(),
            )),
            claim_min_idle: Duration::from_secs(env_parse(
                "WORKER_CLAIM_MIN_IDLE_SECS",
                defaults.claim_min_idle.as_secs(),
            )),
            heartbeat_interval: Duration::from_secs(env_parse(
                "WORKER_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_parse(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_broker_contract() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.hard_timeout, Duration::from_secs(3600));
        assert_eq!(config.soft_timeout, Duration::from_secs(3000));
        assert!(config.soft_timeout < config.hard_timeout);
    }
}
