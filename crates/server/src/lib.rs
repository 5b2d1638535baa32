//! HTTP surface for the move analysis pipeline.

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;

use analysis_worker::{CommentarySynthesizer, GameAnalyzer, JobRunner};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::JobQueue;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct Services {
    pub analyzer: GameAnalyzer,
    /// `None` when no text generator is configured
    pub commentary: Option<CommentarySynthesizer>,
    pub jobs: JobRunner,
    pub queue: JobQueue,
}

pub fn build_router(services: Services) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Analysis
        .route("/api/analysis", post(routes::analysis::analyze_game))
        .route("/api/analysis/jobs", post(routes::jobs::submit_job))
        .route("/api/analysis/jobs/{job_id}", get(routes::jobs::get_job))
        // Shared state
        .layer(Extension(services.analyzer))
        .layer(Extension(services.commentary))
        .layer(Extension(services.jobs))
        .layer(Extension(services.queue))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
