//! Analysis job worker
//!
//! Pulls job ids from SQS, runs each job's transcript through the engine
//! pipeline and records the outcome in Postgres.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use analysis_worker::config::WorkerConfig;
use analysis_worker::db::{self, PgJobStore};
use analysis_worker::jobs::{JobId, JobOutcome, JobRunner};
use analysis_worker::sqs::SqsClient;
use analysis_worker::GameAnalyzer;

/// Parse --job 123,456 from CLI args
fn parse_job_ids() -> Option<Vec<JobId>> {
    let args: Vec<String> = std::env::args().collect();
    let pos = args.iter().position(|a| a == "--job")?;
    let ids: Vec<JobId> = args
        .get(pos + 1)?
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    (!ids.is_empty()).then_some(ids)
}

/// Resolves on SIGTERM (spot interruption) or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn connect(config: &WorkerConfig) -> anyhow::Result<sqlx::PgPool> {
    // headroom for overlapping saves
    let pool_size = (config.worker_concurrency + 2) as u32;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .connect(&config.database_url)
        .await?;
    db::run_migrations(&pool).await?;
    info!(pool_size, "Database connection pool established");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    // --job mode: run specific jobs locally, skip SQS
    if let Some(job_ids) = parse_job_ids() {
        // Force local dev mode so config doesn't need AWS secrets
        std::env::set_var("LOCAL_DEV", "1");
        std::env::set_var("SQS_QUEUE_URL", "unused");

        let config = WorkerConfig::load().await?;
        let pool = connect(&config).await?;
        let runner = JobRunner::new(
            Arc::new(PgJobStore::new(pool)),
            GameAnalyzer::stockfish(&config.engine),
        );

        for job_id in job_ids {
            match runner.run_job(job_id).await {
                Ok(outcome) => println!("job {job_id}: {outcome:?}"),
                Err(e) => println!("job {job_id}: ERROR {e}"),
            }
        }
        return Ok(());
    }

    // Load config (fetches DB URL from Secrets Manager in prod)
    let config = WorkerConfig::load().await?;
    info!(
        stockfish_path = %config.engine.stockfish_path,
        depth = config.engine.depth,
        engine_workers = config.engine.engine_workers,
        worker_concurrency = config.worker_concurrency,
        "Worker config loaded"
    );

    let pool = connect(&config).await?;
    let runner = JobRunner::new(
        Arc::new(PgJobStore::new(pool)),
        GameAnalyzer::stockfish(&config.engine),
    );

    // Jobs a crashed worker left behind
    runner.sweep_stale(config.stale_job_after).await?;

    let sqs = SqsClient::new(&config).await?;
    info!(queue_url = %config.sqs_queue_url, "SQS client ready");

    let concurrency = config.worker_concurrency;
    let semaphore = Arc::new(Semaphore::new(concurrency));

    // Track consecutive empty receives for graceful exit
    let mut empty_receives = 0;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Starting main loop");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, waiting for in-flight jobs...");
                break;
            }
            result = sqs.receive_messages(concurrency as i32) => {
                let messages = match result {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!(error = %e, "Failed to receive messages");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if messages.is_empty() {
                    empty_receives += 1;
                    if empty_receives >= config.max_empty_receives {
                        info!("No messages after {} polls, exiting", config.max_empty_receives);
                        break;
                    }
                    continue;
                }
                empty_receives = 0;

                for msg in messages {
                    let Some(job_id) = msg.job_id() else {
                        warn!(body = %msg.body, "Invalid job id, deleting message");
                        let _ = sqs.delete_message(&msg.receipt_handle).await;
                        continue;
                    };

                    let permit = semaphore.clone().acquire_owned().await?;
                    let runner = runner.clone();
                    let sqs = sqs.clone();

                    tokio::spawn(async move {
                        let _permit = permit; // Hold until done

                        match runner.run_job(job_id).await {
                            Ok(outcome) => {
                                if outcome != JobOutcome::Skipped {
                                    info!(job_id, ?outcome, "Job finished");
                                }
                                let _ = sqs.delete_message(&msg.receipt_handle).await;
                            }
                            Err(e) => {
                                error!(job_id, error = %e, "Job store failure");
                                // Don't delete - will retry via visibility timeout
                            }
                        }
                    });
                }
            }
        }
    }

    // Acquire all permits = wait for all tasks to complete
    let _ = semaphore.acquire_many(concurrency as u32).await;
    info!("Graceful shutdown complete");

    Ok(())
}
