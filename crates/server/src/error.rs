use analysis_worker::{AnalysisError, GameAnalysis, PersistenceFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Commentary failed; the engine analysis is still delivered.
    #[error("{detail}")]
    CommentaryUnavailable {
        detail: String,
        analysis: Box<GameAnalysis>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Parse(e) => AppError::BadRequest(e.to_string()),
            AnalysisError::Replay(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::CommentaryUnavailable { detail, analysis } => {
                tracing::warn!("Commentary unavailable: {detail}");
                let body = json!({
                    "detail": detail,
                    "analysis": analysis.records,
                    "summary": analysis.summary,
                });
                return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Persistence(e) => {
                tracing::error!("Job store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Anyhow(e) => {
                tracing::error!("Unexpected error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
