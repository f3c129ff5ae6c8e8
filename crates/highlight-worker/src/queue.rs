//! SQS-backed [`MessageSource`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use highlight_core::WorkerConfig;

use crate::envelope::QueueEnvelope;
use crate::poller::MessageSource;

/// SQS accepts at most ten entries per batch request.
const MAX_BATCH_ENTRIES: usize = 10;

pub struct SqsMessageSource {
    client: Client,
    queue_url: String,
    max_messages: i32,
    wait_time_secs: i32,
    visibility_timeout_secs: i32,
}

impl SqsMessageSource {
    pub fn new(
        client: Client,
        queue_url: impl Into<String>,
        max_messages: i32,
        wait_time_secs: i32,
        visibility_timeout_secs: i32,
    ) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            max_messages,
            wait_time_secs,
            visibility_timeout_secs,
        }
    }

    pub fn from_config(config: &WorkerConfig, sdk_config: &aws_config::SdkConfig) -> Result<Self> {
        let queue_url = config
            .queue_url
            .clone()
            .context("QUEUE_URL not configured")?;
        Ok(Self::new(
            Client::new(sdk_config),
            queue_url,
            config.poller_max_messages,
            config.poller_wait_time_secs,
            config.poller_visibility_timeout_secs,
        ))
    }
}

#[async_trait]
impl MessageSource for SqsMessageSource {
    async fn receive(&self) -> Result<Vec<QueueEnvelope>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_time_secs)
            .visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .context("ReceiveMessage failed")?;

        let envelopes: Vec<QueueEnvelope> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(QueueEnvelope::from)
            .collect();

        if !envelopes.is_empty() {
            tracing::debug!(count = envelopes.len(), "Received messages");
        }
        Ok(envelopes)
    }

    async fn acknowledge(&self, envelopes: &[&QueueEnvelope]) -> Result<()> {
        let handles: Vec<&str> = envelopes
            .iter()
            .filter_map(|e| e.receipt_handle.as_deref())
            .collect();

        for chunk in handles.chunks(MAX_BATCH_ENTRIES) {
            let entries = chunk
                .iter()
                .enumerate()
                .map(|(i, handle)| {
                    DeleteMessageBatchRequestEntry::builder()
                        .id(i.to_string())
                        .receipt_handle(*handle)
                        .build()
                })
                .collect::<Result<Vec<_>, _>>()
                .context("invalid DeleteMessageBatch entry")?;

            let output = self
                .client
                .delete_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .context("DeleteMessageBatch failed")?;

            for failed in output.failed() {
                tracing::warn!(
                    entry = %failed.id(),
                    code = %failed.code(),
                    message = failed.message().unwrap_or_default(),
                    "Message not deleted"
                );
            }
        }
        Ok(())
    }

    async fn release(&self, envelope: &QueueEnvelope, delay: Duration) -> Result<()> {
        let handle = envelope
            .receipt_handle
            .as_deref()
            .context("message has no receipt handle")?;

        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(handle)
            .visibility_timeout(i32::try_from(delay.as_secs()).unwrap_or(i32::MAX))
            .send()
            .await
            .context("ChangeMessageVisibility failed")?;

        tracing::debug!(
            message_id = %envelope.message_id,
            delay_secs = delay.as_secs(),
            "Message released for redelivery"
        );
        Ok(())
    }
}
