//! SQS client for queueing background analysis jobs

use analysis_worker::JobId;
use aws_sdk_sqs::Client as SqsClient;

use crate::config::Config;

/// Publishes job ids for the analysis worker
#[derive(Clone)]
pub struct AnalysisQueue {
    sqs: SqsClient,
    queue_url: String,
}

impl AnalysisQueue {
    /// Create a new client from config.
    /// Returns None if SQS is not configured.
    pub async fn new(config: &Config) -> Option<Self> {
        let queue_url = config.sqs_queue_url.as_ref()?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let sqs = if let Some(endpoint) = &config.sqs_endpoint_url {
            // LocalStack or custom endpoint
            let sqs_config = aws_sdk_sqs::config::Builder::from(&aws_config)
                .endpoint_url(endpoint)
                .build();
            SqsClient::from_conf(sqs_config)
        } else {
            SqsClient::new(&aws_config)
        };

        Some(Self {
            sqs,
            queue_url: queue_url.clone(),
        })
    }

    /// Queue one job; the message body is the bare job id
    pub async fn queue_job(&self, job_id: JobId) -> Result<(), String> {
        self.sqs
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(job_id.to_string())
            .send()
            .await
            .map_err(|e| format!("Failed to send SQS message: {e}"))?;

        Ok(())
    }
}
