//! In-process job queue, used when no SQS queue is configured

use std::sync::Arc;
use std::time::Duration;

use analysis_worker::jobs::JobOutcome;
use analysis_worker::{JobId, JobRunner, PersistenceFailure};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info};

/// Feeds job ids to a bounded set of runner tasks on this process.
#[derive(Clone)]
pub struct LocalQueue {
    tx: mpsc::UnboundedSender<JobId>,
}

impl LocalQueue {
    /// Sweep jobs a previous run left `in_progress`, then start the
    /// dispatch loop. At most `concurrency` jobs run at once.
    pub async fn start(
        runner: JobRunner,
        concurrency: usize,
        stale_after: Duration,
    ) -> Result<Self, PersistenceFailure> {
        runner.sweep_stale(stale_after).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<JobId>();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        tokio::spawn(async move {
            while let Some(job_id) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let runner = runner.clone();

                tokio::spawn(async move {
                    let _permit = permit; // Hold until done

                    match runner.run_job(job_id).await {
                        Ok(JobOutcome::Skipped) => {}
                        Ok(outcome) => info!(job_id, ?outcome, "In-process job finished"),
                        Err(e) => error!(job_id, error = %e, "In-process job failed"),
                    }
                });
            }
        });

        Ok(Self { tx })
    }

    pub fn queue_job(&self, job_id: JobId) -> Result<(), String> {
        self.tx
            .send(job_id)
            .map_err(|_| "Local job worker has stopped".to_string())
    }
}
