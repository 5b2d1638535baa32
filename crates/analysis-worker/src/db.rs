//! Postgres job store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::error::PersistenceFailure;
use crate::jobs::{AnalysisJob, JobId, JobStatus, JobStore, NewJob, ABANDONED_DETAIL};
use crate::records::PlyRecord;

/// Create the jobs table if it does not exist.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(JOBS_SCHEMA).execute(pool).await?;
    Ok(())
}

pub const JOBS_SCHEMA: &str = r#"
-- Background analysis jobs
CREATE TABLE IF NOT EXISTS analysis_jobs (
    id          BIGSERIAL PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    game_id     TEXT NOT NULL,
    pgn         TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_progress', 'done', 'error')),
    result      JSONB NOT NULL DEFAULT '[]'::jsonb,
    error       TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_analysis_jobs_owner
    ON analysis_jobs (owner_id);
CREATE INDEX IF NOT EXISTS idx_analysis_jobs_status
    ON analysis_jobs (status, updated_at);
"#;

const JOB_COLUMNS: &str =
    "id, owner_id, game_id, pgn, status, result, error, created_at, updated_at";

type JobRow = (
    i64,
    String,
    String,
    String,
    String,
    JsonValue,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn job_from_row(row: JobRow) -> Result<AnalysisJob, PersistenceFailure> {
    let (id, owner_id, game_id, pgn, status, result, error, created_at, updated_at) = row;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| PersistenceFailure::Corrupt(format!("job {id} has status '{status}'")))?;
    let result: Vec<PlyRecord> = serde_json::from_value(result)?;

    Ok(AnalysisJob {
        id,
        owner_id,
        game_id,
        pgn,
        status,
        result,
        error,
        created_at,
        updated_at,
    })
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded update matched no row.
    async fn rejected(&self, id: JobId, to: JobStatus) -> PersistenceFailure {
        match self.get(id).await {
            Ok(Some(job)) => PersistenceFailure::InvalidTransition {
                id,
                from: job.status,
                to,
            },
            Ok(None) => PersistenceFailure::NotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: NewJob) -> Result<AnalysisJob, PersistenceFailure> {
        let row: JobRow = sqlx::query_as(&format!(
            "INSERT INTO analysis_jobs (owner_id, game_id, pgn) VALUES ($1, $2, $3) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.owner_id)
        .bind(&job.game_id)
        .bind(&job.pgn)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(row)
    }

    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, PersistenceFailure> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(job_from_row).transpose()
    }

    async fn claim(&self, id: JobId) -> Result<AnalysisJob, PersistenceFailure> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "UPDATE analysis_jobs SET status = 'in_progress', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => job_from_row(row),
            None => Err(self.rejected(id, JobStatus::InProgress).await),
        }
    }

    async fn complete(&self, id: JobId, result: &[PlyRecord]) -> Result<(), PersistenceFailure> {
        let done = sqlx::query(
            r#"UPDATE analysis_jobs
               SET status = 'done', result = $2, error = NULL, updated_at = NOW()
               WHERE id = $1 AND status = 'in_progress'"#,
        )
        .bind(id)
        .bind(serde_json::to_value(result)?)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(self.rejected(id, JobStatus::Done).await);
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, detail: &str) -> Result<(), PersistenceFailure> {
        let done = sqlx::query(
            r#"UPDATE analysis_jobs
               SET status = 'error', error = $2, updated_at = NOW()
               WHERE id = $1 AND status = 'in_progress'"#,
        )
        .bind(id)
        .bind(detail)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(self.rejected(id, JobStatus::Error).await);
        }
        Ok(())
    }

    async fn fail_stale(&self, older_than: Duration) -> Result<Vec<JobId>, PersistenceFailure> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"UPDATE analysis_jobs
               SET status = 'error', error = $2, updated_at = NOW()
               WHERE status = 'in_progress'
                 AND updated_at < NOW() - make_interval(secs => $1)
               RETURNING id"#,
        )
        .bind(older_than.as_secs_f64())
        .bind(ABANDONED_DETAIL)
        .fetch_all(&self.pool)
        .await?;

        let mut ids: Vec<JobId> = rows.into_iter().map(|(id,)| id).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
