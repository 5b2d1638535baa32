//! Durable analysis jobs
//!
//! `pending -> in_progress -> done | error`. Every transition is a guarded
//! write, so a finished job is never touched again and only the worker
//! that claimed a job can finish it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::analyzer::GameAnalyzer;
use crate::error::PersistenceFailure;
use crate::records::PlyRecord;

pub type JobId = i64;

/// Detail written to jobs swept up at worker start-up.
pub const ABANDONED_DETAIL: &str = "abandoned by worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "in_progress" => Some(JobStatus::InProgress),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub id: JobId,
    pub owner_id: String,
    pub game_id: String,
    pub pgn: String,
    pub status: JobStatus,
    pub result: Vec<PlyRecord>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub owner_id: String,
    pub game_id: String,
    pub pgn: String,
}

/// Persistence for jobs. Transition methods fail with
/// [`PersistenceFailure::InvalidTransition`] when the job is not in the
/// expected state.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: NewJob) -> Result<AnalysisJob, PersistenceFailure>;

    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, PersistenceFailure>;

    /// `pending -> in_progress`
    async fn claim(&self, id: JobId) -> Result<AnalysisJob, PersistenceFailure>;

    /// `in_progress -> done`
    async fn complete(&self, id: JobId, result: &[PlyRecord]) -> Result<(), PersistenceFailure>;

    /// `in_progress -> error`
    async fn fail(&self, id: JobId, detail: &str) -> Result<(), PersistenceFailure>;

    /// Move `in_progress` jobs idle for longer than `older_than` to `error`.
    /// Returns the ids that were moved.
    async fn fail_stale(&self, older_than: Duration) -> Result<Vec<JobId>, PersistenceFailure>;
}

/// In-process store for tests and local runs.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<MemoryJobs>,
}

#[derive(Default)]
struct MemoryJobs {
    next_id: JobId,
    jobs: HashMap<JobId, AnalysisJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind a job's `updated_at`, to simulate an old claim.
    pub async fn backdate(&self, id: JobId, by: chrono::Duration) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&id) {
            job.updated_at -= by;
        }
    }

    async fn transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        apply: impl FnOnce(&mut AnalysisJob) + Send,
    ) -> Result<AnalysisJob, PersistenceFailure> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(PersistenceFailure::NotFound(id))?;
        if job.status != from {
            return Err(PersistenceFailure::InvalidTransition {
                id,
                from: job.status,
                to,
            });
        }
        job.status = to;
        job.updated_at = Utc::now();
        apply(job);
        Ok(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<AnalysisJob, PersistenceFailure> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let now = Utc::now();
        let record = AnalysisJob {
            id: inner.next_id,
            owner_id: job.owner_id,
            game_id: job.game_id,
            pgn: job.pgn,
            status: JobStatus::Pending,
            result: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<AnalysisJob>, PersistenceFailure> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn claim(&self, id: JobId) -> Result<AnalysisJob, PersistenceFailure> {
        self.transition(id, JobStatus::Pending, JobStatus::InProgress, |_| {})
            .await
    }

    async fn complete(&self, id: JobId, result: &[PlyRecord]) -> Result<(), PersistenceFailure> {
        let result = result.to_vec();
        self.transition(id, JobStatus::InProgress, JobStatus::Done, move |job| {
            job.result = result;
        })
        .await
        .map(|_| ())
    }

    async fn fail(&self, id: JobId, detail: &str) -> Result<(), PersistenceFailure> {
        let detail = detail.to_string();
        self.transition(id, JobStatus::InProgress, JobStatus::Error, move |job| {
            job.error = Some(detail);
        })
        .await
        .map(|_| ())
    }

    async fn fail_stale(&self, older_than: Duration) -> Result<Vec<JobId>, PersistenceFailure> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than)
                .map_err(|e| PersistenceFailure::Corrupt(e.to_string()))?;

        let mut inner = self.inner.lock().await;
        let mut swept = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::InProgress && job.updated_at < cutoff {
                job.status = JobStatus::Error;
                job.error = Some(ABANDONED_DETAIL.to_string());
                job.updated_at = Utc::now();
                swept.push(job.id);
            }
        }
        swept.sort_unstable();
        Ok(swept)
    }
}

/// What happened to one job delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    /// The transcript was rejected; the job is in `error`.
    Failed,
    /// Missing or already claimed; nothing was done.
    Skipped,
}

/// Runs queued jobs through the analyzer.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    analyzer: GameAnalyzer,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, analyzer: GameAnalyzer) -> Self {
        Self { store, analyzer }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Claim, analyze and finish one job.
    ///
    /// A persistence error is returned so the delivery can be retried; an
    /// analysis error is recorded on the job itself.
    pub async fn run_job(&self, id: JobId) -> Result<JobOutcome, PersistenceFailure> {
        let job = match self.store.claim(id).await {
            Ok(job) => job,
            Err(PersistenceFailure::NotFound(_)) => {
                warn!(job_id = id, "Job not found, skipping");
                return Ok(JobOutcome::Skipped);
            }
            Err(PersistenceFailure::InvalidTransition { from, .. }) => {
                warn!(job_id = id, status = %from, "Job not pending, skipping");
                return Ok(JobOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        info!(job_id = id, game_id = %job.game_id, owner_id = %job.owner_id, "Job claimed");

        match self.analyzer.analyze_transcript(&job.pgn).await {
            Ok(analysis) => {
                self.store.complete(id, &analysis.records).await?;
                info!(job_id = id, plies = analysis.records.len(), "Job done");
                Ok(JobOutcome::Done)
            }
            Err(e) => {
                error!(job_id = id, error = %e, "Job failed");
                self.store.fail(id, &e.to_string()).await?;
                Ok(JobOutcome::Failed)
            }
        }
    }

    /// Reconcile jobs left `in_progress` by a crashed worker.
    pub async fn sweep_stale(&self, older_than: Duration) -> Result<Vec<JobId>, PersistenceFailure> {
        let swept = self.store.fail_stale(older_than).await?;
        if !swept.is_empty() {
            warn!(count = swept.len(), ids = ?swept, "Marked abandoned jobs as error");
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job() -> NewJob {
        NewJob {
            owner_id: "user-1".into(),
            game_id: "game-1".into(),
            pgn: "1. e4 e5".into(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job()).await.unwrap();
        assert_eq!(job.id, 1);
        assert_eq!(job.status, JobStatus::Pending);

        let claimed = store.claim(job.id).await.unwrap();
        assert_eq!(claimed.status, JobStatus::InProgress);

        let records = vec![PlyRecord::unevaluated(1, "e4".into())];
        store.complete(job.id, &records).await.unwrap();

        let done = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.result, records);
    }

    #[tokio::test]
    async fn test_finished_jobs_are_immutable() {
        let store = MemoryJobStore::new();
        let job = store.create(new_job()).await.unwrap();
        store.claim(job.id).await.unwrap();
        store.fail(job.id, "boom").await.unwrap();

        let err = store.complete(job.id, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceFailure::InvalidTransition {
                from: JobStatus::Error,
                to: JobStatus::Done,
                ..
            }
        ));
        assert!(matches!(
            store.claim(job.id).await.unwrap_err(),
            PersistenceFailure::InvalidTransition { .. }
        ));
        assert!(matches!(
            store.claim(99).await.unwrap_err(),
            PersistenceFailure::NotFound(99)
        ));
    }

    #[tokio::test]
    async fn test_fail_stale_only_touches_old_claims() {
        let store = MemoryJobStore::new();
        let fresh = store.create(new_job()).await.unwrap();
        let old = store.create(new_job()).await.unwrap();
        let pending = store.create(new_job()).await.unwrap();
        store.claim(fresh.id).await.unwrap();
        store.claim(old.id).await.unwrap();
        store.backdate(old.id, chrono::Duration::hours(2)).await;
        store.backdate(pending.id, chrono::Duration::hours(2)).await;

        let swept = store.fail_stale(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(swept, vec![old.id]);

        let old = store.get(old.id).await.unwrap().unwrap();
        assert_eq!(old.status, JobStatus::Error);
        assert_eq!(old.error.as_deref(), Some(ABANDONED_DETAIL));
        let fresh = store.get(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::InProgress);
        let pending = store.get(pending.id).await.unwrap().unwrap();
        assert_eq!(pending.status, JobStatus::Pending);
    }

    #[test]
    fn test_status_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.to_string())
            );
        }
        assert_eq!(JobStatus::parse("queued"), None);
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }
}
