use std::sync::Arc;

use analysis_worker::db::PgJobStore;
use analysis_worker::gemini::GeminiClient;
use analysis_worker::{CommentarySynthesizer, GameAnalyzer, JobRunner};
use coach_server::clients::{local::LocalQueue, JobQueue};
use coach_server::{build_router, clients, config, db, Services};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;

    // Connect to Postgres
    tracing::info!("Connecting to database...");
    let pool = db::pool::create_pool(&config.database_url).await?;

    // Run schema migrations
    tracing::info!("Running migrations...");
    db::pool::run_migrations(&pool).await?;

    let commentary = match GeminiClient::new(&config.generation) {
        Ok(client) => Some(CommentarySynthesizer::new(
            Arc::new(client),
            config.generation.timeout,
        )),
        Err(e) => {
            tracing::warn!("Commentary disabled: {e}");
            None
        }
    };

    tracing::info!(
        stockfish_path = %config.engine.stockfish_path,
        depth = config.engine.depth,
        "Engine configured"
    );
    let analyzer = GameAnalyzer::stockfish(&config.engine);
    let jobs = JobRunner::new(Arc::new(PgJobStore::new(pool)), analyzer.clone());

    // SQS when configured, otherwise a bounded in-process queue
    let queue = match clients::sqs::AnalysisQueue::new(&config).await {
        Some(sqs) => {
            tracing::info!("SQS analysis queue configured");
            JobQueue::Sqs(sqs)
        }
        None => {
            tracing::info!(
                worker_concurrency = config.worker_concurrency,
                "SQS not configured - jobs run in-process"
            );
            JobQueue::Local(
                LocalQueue::start(
                    jobs.clone(),
                    config.worker_concurrency,
                    config.stale_job_after,
                )
                .await?,
            )
        }
    };

    let app = build_router(Services {
        analyzer,
        commentary,
        jobs,
        queue,
    });

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
