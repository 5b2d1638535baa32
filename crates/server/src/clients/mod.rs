pub mod local;
pub mod sqs;

use analysis_worker::JobId;

use self::local::LocalQueue;
use self::sqs::AnalysisQueue;

/// Where submitted jobs go.
#[derive(Clone)]
pub enum JobQueue {
    Sqs(AnalysisQueue),
    Local(LocalQueue),
}

impl JobQueue {
    pub async fn enqueue(&self, job_id: JobId) -> Result<(), String> {
        match self {
            JobQueue::Sqs(queue) => queue.queue_job(job_id).await,
            JobQueue::Local(queue) => queue.queue_job(job_id),
        }
    }
}
