#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use analysis_worker::config::EngineTimeouts;
use analysis_worker::jobs::MemoryJobStore;
use analysis_worker::stockfish::EngineLauncher;
use analysis_worker::{
    AnalysisSettings, CommentarySynthesizer, GameAnalyzer, JobRunner, JobStore, TextGenerator,
};
use coach_server::clients::{local::LocalQueue, JobQueue};
use coach_server::{build_router, Services};
use reqwest::Client;

pub const OPEN_GAME: &str = "1. e4 e5 2. Nf3 Nc6";

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// Short limits so hung engines fail fast.
pub fn fast_timeouts() -> EngineTimeouts {
    EngineTimeouts {
        ready: Duration::from_millis(300),
        search: Duration::from_millis(500),
        exit: Duration::from_millis(200),
    }
}

pub fn analyzer(launcher: impl EngineLauncher + 'static, engine_workers: usize) -> GameAnalyzer {
    GameAnalyzer::new(
        Arc::new(launcher),
        AnalysisSettings {
            depth: 10,
            engine_workers,
            timeouts: fast_timeouts(),
        },
    )
}

/// Server bound to an ephemeral port, backed by an in-memory job store.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryJobStore>,
}

impl TestApp {
    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn spawn_app(
    analyzer: GameAnalyzer,
    generator: Option<Arc<dyn TextGenerator>>,
) -> TestApp {
    spawn_app_with_workers(analyzer, generator, 1).await
}

/// Like [`spawn_app`], with `workers` in-process jobs allowed at once.
pub async fn spawn_app_with_workers(
    analyzer: GameAnalyzer,
    generator: Option<Arc<dyn TextGenerator>>,
    workers: usize,
) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let jobs = JobRunner::new(store.clone() as Arc<dyn JobStore>, analyzer.clone());
    let commentary =
        generator.map(|g| CommentarySynthesizer::new(g, Duration::from_millis(500)));
    let queue = LocalQueue::start(jobs.clone(), workers, Duration::from_secs(3600))
        .await
        .unwrap();

    let app = build_router(Services {
        analyzer,
        commentary,
        jobs,
        queue: JobQueue::Local(queue),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        store,
    }
}
