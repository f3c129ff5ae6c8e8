//! Long-polling consumer for hosts without the Lambda event source.
//!
//! Receives a batch, runs it through the same [`BatchProcessor`] as the
//! Lambda handler, then settles every message itself: finished or
//! permanently failed messages are deleted, retriable ones are made visible
//! again after an exponential backoff.
//!
//! Shutdown only interrupts the wait for messages. A batch that has been
//! received is always processed and settled before the loop exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::batch::{BatchProcessor, BatchReport};
use crate::envelope::QueueEnvelope;

/// Cap for the redelivery delay of a retriable message.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Delay before a retriable message becomes visible again: 1s on the first
/// delivery, doubling per delivery, capped at [`MAX_RETRY_BACKOFF_SECS`].
pub fn retry_backoff_seconds(receive_count: Option<u32>) -> u64 {
    let attempt = receive_count.unwrap_or(1).saturating_sub(1);
    2_u64
        .checked_pow(attempt)
        .map_or(MAX_RETRY_BACKOFF_SECS, |secs| secs.min(MAX_RETRY_BACKOFF_SECS))
}

/// Queue operations the poller needs.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next batch. An empty batch means the wait timed out.
    async fn receive(&self) -> anyhow::Result<Vec<QueueEnvelope>>;

    /// Remove messages that need no further delivery.
    async fn acknowledge(&self, envelopes: &[&QueueEnvelope]) -> anyhow::Result<()>;

    /// Make a message visible again after `delay`.
    async fn release(&self, envelope: &QueueEnvelope, delay: Duration) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Visibility timeout requested on receive. The queue starts it when the
    /// batch is returned, so the batch deadline is measured from then.
    pub visibility_timeout: Duration,
    /// Pause after a failed receive.
    pub receive_error_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            receive_error_backoff: Duration::from_secs(5),
        }
    }
}

pub struct QueuePoller {
    source: Arc<dyn MessageSource>,
    processor: Arc<BatchProcessor>,
    config: PollerConfig,
}

impl QueuePoller {
    pub fn new(
        source: Arc<dyn MessageSource>,
        processor: Arc<BatchProcessor>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            processor,
            config,
        }
    }

    /// Receive, process and settle a single batch.
    pub async fn poll_once(&self) -> anyhow::Result<BatchReport> {
        let envelopes = self.source.receive().await?;
        Ok(self.process_and_settle(&envelopes, Instant::now()).await)
    }

    /// Poll until a shutdown signal arrives or the sender is dropped.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            visibility_timeout_secs = self.config.visibility_timeout.as_secs(),
            "Queue poller started"
        );

        loop {
            let received = tokio::select! {
                _ = shutdown_rx.recv() => break,
                received = self.source.receive() => received,
            };

            match received {
                Ok(envelopes) => {
                    self.process_and_settle(&envelopes, Instant::now()).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Receive failed, backing off");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = sleep(self.config.receive_error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Queue poller stopped");
    }

    async fn process_and_settle(
        &self,
        envelopes: &[QueueEnvelope],
        received_at: Instant,
    ) -> BatchReport {
        if envelopes.is_empty() {
            return BatchReport::default();
        }

        let deadline = received_at + self.config.visibility_timeout;
        let report = self.processor.process_batch(envelopes, Some(deadline)).await;

        let mut done = Vec::new();
        for (envelope, outcome) in envelopes.iter().zip(&report.outcomes) {
            if !outcome.is_retriable_failure() {
                done.push(envelope);
                continue;
            }
            let delay = Duration::from_secs(retry_backoff_seconds(envelope.receive_count));
            if let Err(e) = self.source.release(envelope, delay).await {
                // Visibility timeout still expires; the message comes back anyway.
                tracing::warn!(
                    message_id = %envelope.message_id,
                    error = %e,
                    "Failed to release message"
                );
            }
        }

        if !done.is_empty() {
            if let Err(e) = self.source.acknowledge(&done).await {
                tracing::error!(
                    error = %e,
                    count = done.len(),
                    "Failed to delete processed messages; they will be redelivered"
                );
            }
        }

        report
    }
}
