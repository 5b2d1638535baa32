//! SQS client wrapper for the analysis job queue

use aws_sdk_sqs::Client;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::jobs::JobId;

/// A message received from SQS
#[derive(Debug, Clone)]
pub struct SqsMessage {
    /// Message body (contains the job id)
    pub body: String,
    /// Receipt handle for deletion
    pub receipt_handle: String,
}

impl SqsMessage {
    pub fn job_id(&self) -> Option<JobId> {
        parse_job_id(&self.body)
    }
}

/// Message bodies are a bare job id.
pub fn parse_job_id(body: &str) -> Option<JobId> {
    body.trim().parse().ok().filter(|id: &JobId| *id > 0)
}

/// SQS client for receiving and acknowledging analysis jobs
#[derive(Clone)]
pub struct SqsClient {
    client: Client,
    queue_url: String,
    visibility_timeout: i32,
}

impl SqsClient {
    pub async fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        // For LocalStack/local dev, use custom endpoint
        let client = if let Some(endpoint) = &config.sqs_endpoint_url {
            let sqs_config = aws_sdk_sqs::config::Builder::from(&aws_config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(sqs_config)
        } else {
            Client::new(&aws_config)
        };

        Ok(Self {
            client,
            queue_url: config.sqs_queue_url.clone(),
            visibility_timeout: config.visibility_timeout_secs as i32,
        })
    }

    /// Receive up to `max` messages with long polling
    pub async fn receive_messages(&self, max: i32) -> Result<Vec<SqsMessage>, WorkerError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.clamp(1, 10))
            .wait_time_seconds(20) // Long polling
            .visibility_timeout(self.visibility_timeout)
            .send()
            .await
            .map_err(|e| WorkerError::Sqs(format!("Failed to receive messages: {e}")))?;

        let messages = response
            .messages()
            .iter()
            .filter_map(|msg| {
                let body = msg.body()?;
                let receipt = msg.receipt_handle()?;
                Some(SqsMessage {
                    body: body.to_string(),
                    receipt_handle: receipt.to_string(),
                })
            })
            .collect();

        debug!(count = response.messages().len(), "Received messages");
        Ok(messages)
    }

    /// Delete a message from the queue (after it has been handled)
    pub async fn delete_message(&self, receipt_handle: &str) -> Result<(), WorkerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| WorkerError::Sqs(format!("Failed to delete message: {e}")))?;

        debug!("Deleted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("42"), Some(42));
        assert_eq!(parse_job_id(" 7\n"), Some(7));
        assert_eq!(parse_job_id("0"), None);
        assert_eq!(parse_job_id("-3"), None);
        assert_eq!(parse_job_id("{\"jobId\": 1}"), None);
    }
}
