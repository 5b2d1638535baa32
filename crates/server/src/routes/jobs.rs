//! Background analysis jobs: submission and status

use analysis_worker::jobs::NewJob;
use analysis_worker::{AnalysisJob, JobId, JobRunner};
use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::clients::JobQueue;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub pgn: String,
    pub owner_id: String,
    pub game_id: String,
}

/// POST /api/analysis/jobs
pub async fn submit_job(
    Extension(runner): Extension<JobRunner>,
    Extension(queue): Extension<JobQueue>,
    Json(body): Json<SubmitJobRequest>,
) -> Result<Json<JsonValue>, AppError> {
    if body.pgn.trim().is_empty() {
        return Err(AppError::BadRequest("Missing PGN".into()));
    }
    if body.owner_id.trim().is_empty() {
        return Err(AppError::BadRequest("Missing ownerId".into()));
    }
    // Reject unreadable transcripts before they reach the queue
    game_replay::load_transcript(&body.pgn).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let job = runner
        .store()
        .create(NewJob {
            owner_id: body.owner_id,
            game_id: body.game_id,
            pgn: body.pgn,
        })
        .await?;

    queue.enqueue(job.id).await.map_err(AppError::Internal)?;

    tracing::info!(
        job_id = job.id,
        owner_id = %job.owner_id,
        game_id = %job.game_id,
        "Analysis job submitted"
    );

    Ok(Json(json!({
        "jobId": job.id,
        "status": job.status,
    })))
}

/// GET /api/analysis/jobs/{job_id}
pub async fn get_job(
    Extension(runner): Extension<JobRunner>,
    Path(job_id): Path<JobId>,
) -> Result<Json<AnalysisJob>, AppError> {
    runner
        .store()
        .get(job_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Job not found".into()))
}
