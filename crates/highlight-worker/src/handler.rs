//! Lambda SQS event-source entry point.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_lambda_events::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent};
use lambda_runtime::LambdaEvent;
use tokio::time::Instant;

use crate::batch::{BatchProcessor, BatchReport};
use crate::envelope::QueueEnvelope;

/// Handle one invocation.
///
/// Never fails the invocation for per-message errors: those are reported in
/// the partial-batch response, and only retriable ones are listed.
pub async fn handler(
    processor: &BatchProcessor,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, lambda_runtime::Error> {
    let deadline = invocation_deadline(event.context.deadline);
    let envelopes: Vec<QueueEnvelope> = event
        .payload
        .records
        .into_iter()
        .map(QueueEnvelope::from)
        .collect();

    tracing::debug!(
        request_id = %event.context.request_id,
        envelopes = envelopes.len(),
        "Received SQS batch"
    );

    let report = processor.process_batch(&envelopes, deadline).await;
    Ok(batch_response(&report))
}

/// Convert the runtime's wall-clock deadline (epoch milliseconds) to a
/// monotonic instant. Zero means the runtime did not provide one.
pub fn invocation_deadline(deadline_ms: u64) -> Option<Instant> {
    if deadline_ms == 0 {
        return None;
    }
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    Some(Instant::now() + Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

pub fn batch_response(report: &BatchReport) -> SqsBatchResponse {
    let mut response = SqsBatchResponse::default();
    for message_id in report.retry_message_ids() {
        let mut failure = BatchItemFailure::default();
        failure.item_identifier = message_id.to_string();
        response.batch_item_failures.push(failure);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ItemOutcome;
    use highlight_core::{KeyError, PipelineError, StoreError};

    fn fail(id: &str, error: PipelineError) -> ItemOutcome {
        ItemOutcome::Fail {
            message_id: id.to_string(),
            applied: Vec::new(),
            retriable: error.is_retriable(),
            error,
        }
    }

    #[test]
    fn only_retriable_failures_are_reported() {
        let report = BatchReport {
            outcomes: vec![
                ItemOutcome::Ok {
                    message_id: "m-1".to_string(),
                    applied: vec!["r1".to_string()],
                },
                fail(
                    "m-2",
                    PipelineError::MalformedKey(KeyError::Malformed {
                        key: "videos/x".to_string(),
                        reason: "expected at least two '_'-separated fields",
                    }),
                ),
                fail(
                    "m-3",
                    PipelineError::Store(StoreError::retriable(anyhow::anyhow!("throttled"))),
                ),
            ],
            ..Default::default()
        };

        let response = batch_response(&report);
        let ids: Vec<&str> = response
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["m-3"]);
    }

    #[test]
    fn zero_deadline_means_none() {
        assert!(invocation_deadline(0).is_none());
    }

    #[test]
    fn past_deadline_is_now() {
        let deadline = invocation_deadline(1).unwrap();
        assert!(deadline <= Instant::now());
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_response() {
        let repo = highlight_db::InMemoryRecordRepository::new(true);
        let updater = crate::StatusUpdater::new(
            std::sync::Arc::new(repo),
            std::sync::Arc::new(highlight_core::FixedClock(1)),
        );
        let processor = BatchProcessor::new(updater, Duration::ZERO);
        let event = LambdaEvent::new(SqsEvent::default(), lambda_runtime::Context::default());

        let response = handler(&processor, event).await.unwrap();
        assert!(response.batch_item_failures.is_empty());
    }
}
