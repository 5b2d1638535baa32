use std::env;
use std::time::Duration;

use analysis_worker::config::{EngineSettings, GenerationSettings};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Job queue; jobs run in-process when unset
    pub sqs_queue_url: Option<String>,
    pub sqs_endpoint_url: Option<String>,

    /// In-process jobs run at once when there is no queue
    pub worker_concurrency: usize,

    /// `in_progress` jobs older than this are swept at start-up
    pub stale_job_after: Duration,

    pub engine: EngineSettings,
    pub generation: GenerationSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            sqs_queue_url: env::var("SQS_QUEUE_URL").ok().filter(|v| !v.is_empty()),
            sqs_endpoint_url: env::var("SQS_ENDPOINT_URL").ok(),
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1usize)
                .max(1),
            stale_job_after: Duration::from_secs(
                env::var("STALE_JOB_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
            engine: EngineSettings::from_env(),
            generation: GenerationSettings::from_env(),
        })
    }
}
