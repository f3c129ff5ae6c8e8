//! Batch driver shared by the Lambda handler and the poller.

use std::time::Duration;

use highlight_core::{LogLevel, PipelineError};
use tokio::time::{timeout_at, Instant};

use crate::envelope::QueueEnvelope;
use crate::unwrap::unwrap_envelope;
use crate::updater::StatusUpdater;

/// Result of one envelope.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Every inner notification was applied, or there were none.
    Ok {
        message_id: String,
        applied: Vec<String>,
    },
    /// At least one inner notification failed. `applied` lists the record
    /// ids that were still updated before or after the failure.
    Fail {
        message_id: String,
        applied: Vec<String>,
        retriable: bool,
        error: PipelineError,
    },
}

impl ItemOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            ItemOutcome::Ok { message_id, .. } | ItemOutcome::Fail { message_id, .. } => message_id,
        }
    }

    pub fn applied(&self) -> &[String] {
        match self {
            ItemOutcome::Ok { applied, .. } | ItemOutcome::Fail { applied, .. } => applied,
        }
    }

    /// Only these envelopes go back to the queue.
    pub fn is_retriable_failure(&self) -> bool {
        matches!(self, ItemOutcome::Fail { retriable: true, .. })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub envelopes: usize,
    pub applied: usize,
    /// Envelopes that carried no notifications.
    pub skipped: usize,
    pub permanent: usize,
    pub retriable: usize,
}

/// One outcome per input envelope, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn retry_message_ids(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_retriable_failure())
            .map(ItemOutcome::message_id)
    }

    fn push(&mut self, outcome: ItemOutcome, had_notifications: bool) {
        self.stats.envelopes += 1;
        self.stats.applied += outcome.applied().len();
        match &outcome {
            ItemOutcome::Ok { .. } if !had_notifications => self.stats.skipped += 1,
            ItemOutcome::Ok { .. } => {}
            ItemOutcome::Fail { retriable: true, .. } => self.stats.retriable += 1,
            ItemOutcome::Fail { .. } => self.stats.permanent += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Processes envelopes sequentially; a failure in one never affects another.
pub struct BatchProcessor {
    updater: StatusUpdater,
    deadline_margin: Duration,
}

impl BatchProcessor {
    pub fn new(updater: StatusUpdater, deadline_margin: Duration) -> Self {
        Self {
            updater,
            deadline_margin,
        }
    }

    /// Process `envelopes` in order.
    ///
    /// With a deadline, work stops `deadline_margin` before it. The envelope
    /// in flight at that point and every envelope not yet started are
    /// reported as retriable [`PipelineError::DeadlineExceeded`] failures.
    pub async fn process_batch(
        &self,
        envelopes: &[QueueEnvelope],
        deadline: Option<Instant>,
    ) -> BatchReport {
        let cutoff = deadline.map(|d| {
            d.checked_sub(self.deadline_margin)
                .unwrap_or_else(Instant::now)
        });
        let mut report = BatchReport::default();

        for (index, envelope) in envelopes.iter().enumerate() {
            if cutoff.is_some_and(|c| Instant::now() >= c) {
                for remaining in &envelopes[index..] {
                    let outcome = deadline_exceeded(remaining);
                    log_failure(&outcome);
                    report.push(outcome, true);
                }
                break;
            }

            let (outcome, had_notifications) = self.process_envelope(envelope, cutoff).await;
            if let ItemOutcome::Fail { .. } = &outcome {
                log_failure(&outcome);
            }
            report.push(outcome, had_notifications);
        }

        let stats = report.stats;
        tracing::info!(
            envelopes = stats.envelopes,
            applied = stats.applied,
            skipped = stats.skipped,
            permanent_failures = stats.permanent,
            retriable_failures = stats.retriable,
            "Batch processed"
        );
        report
    }

    async fn process_envelope(
        &self,
        envelope: &QueueEnvelope,
        cutoff: Option<Instant>,
    ) -> (ItemOutcome, bool) {
        let message_id = envelope.message_id.clone();

        let notifications = match unwrap_envelope(envelope) {
            Ok(n) => n,
            Err(error) => {
                return (
                    ItemOutcome::Fail {
                        message_id,
                        applied: Vec::new(),
                        retriable: error.is_retriable(),
                        error,
                    },
                    true,
                )
            }
        };

        if notifications.is_empty() {
            tracing::info!(
                message_id = %message_id,
                "Envelope carries no notifications, skipping"
            );
            return (
                ItemOutcome::Ok {
                    message_id,
                    applied: Vec::new(),
                },
                false,
            );
        }

        let mut applied = Vec::new();
        let mut failure: Option<PipelineError> = None;

        for notification in notifications {
            let result = match notification {
                Ok(notification) => match cutoff {
                    Some(cutoff) => timeout_at(cutoff, self.updater.apply(&notification))
                        .await
                        .unwrap_or(Err(PipelineError::DeadlineExceeded)),
                    None => self.updater.apply(&notification).await,
                },
                Err(error) => Err(error),
            };

            match result {
                Ok(record) => applied.push(record.record_id),
                Err(error) => {
                    let stop = matches!(error, PipelineError::DeadlineExceeded);
                    // A retriable error outranks a permanent one: the
                    // envelope must come back.
                    failure = Some(match failure.take() {
                        Some(previous) if previous.is_retriable() || !error.is_retriable() => {
                            log_additional_failure(&message_id, &error);
                            previous
                        }
                        Some(previous) => {
                            log_additional_failure(&message_id, &previous);
                            error
                        }
                        None => error,
                    });
                    if stop {
                        break;
                    }
                }
            }
        }

        let outcome = match failure {
            None => ItemOutcome::Ok {
                message_id,
                applied,
            },
            Some(error) => ItemOutcome::Fail {
                message_id,
                applied,
                retriable: error.is_retriable(),
                error,
            },
        };
        (outcome, true)
    }
}

fn deadline_exceeded(envelope: &QueueEnvelope) -> ItemOutcome {
    ItemOutcome::Fail {
        message_id: envelope.message_id.clone(),
        applied: Vec::new(),
        retriable: true,
        error: PipelineError::DeadlineExceeded,
    }
}

fn log_additional_failure(message_id: &str, error: &PipelineError) {
    tracing::warn!(
        message_id = %message_id,
        kind = error.kind(),
        error = %error,
        "Additional failure in envelope"
    );
}

fn log_failure(outcome: &ItemOutcome) {
    let ItemOutcome::Fail {
        message_id,
        retriable,
        error,
        ..
    } = outcome
    else {
        return;
    };

    match error.log_level() {
        LogLevel::Warn => tracing::warn!(
            message_id = %message_id,
            kind = error.kind(),
            retriable,
            error = %error,
            "Envelope failed"
        ),
        LogLevel::Error => tracing::error!(
            message_id = %message_id,
            kind = error.kind(),
            retriable,
            error = %error,
            "Envelope failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use highlight_core::{FixedClock, Record};
    use highlight_db::{Fault, InMemoryRecordRepository};
    use std::sync::Arc;

    fn processor(repo: &InMemoryRecordRepository) -> BatchProcessor {
        let updater = StatusUpdater::new(Arc::new(repo.clone()), Arc::new(FixedClock(100)));
        BatchProcessor::new(updater, Duration::from_millis(50))
    }

    fn body(keys: &[&str]) -> String {
        let records: Vec<String> = keys
            .iter()
            .map(|k| {
                format!(
                    r#"{{"s3":{{"bucket":{{"name":"b"}},"object":{{"key":"{k}","size":7}}}}}}"#
                )
            })
            .collect();
        format!(r#"{{"Records":[{}]}}"#, records.join(","))
    }

    #[tokio::test]
    async fn retriable_failure_outranks_permanent_within_envelope() {
        let repo = InMemoryRecordRepository::new(true);
        repo.insert(Record::pending("r2", "u1", 1));
        repo.fail_next("r2", Fault::Unavailable);

        let envelopes = vec![QueueEnvelope::new(
            "m-1",
            body(&["videos/bad", "videos/u1_r2_1_a.mp4"]),
        )];
        let report = processor(&repo).process_batch(&envelopes, None).await;

        assert!(report.outcomes[0].is_retriable_failure());
        assert_eq!(report.stats.retriable, 1);
        assert_eq!(report.stats.permanent, 0);
    }

    #[tokio::test]
    async fn stats_count_skips_and_applied() {
        let repo = InMemoryRecordRepository::new(true);
        repo.insert(Record::pending("r1", "u1", 1));

        let envelopes = vec![
            QueueEnvelope::new("m-1", body(&["videos/u1_r1_1_a.mp4"])),
            QueueEnvelope::new("m-2", r#"{"Event":"s3:TestEvent"}"#),
            QueueEnvelope::new("m-3", "not json"),
        ];
        let report = processor(&repo).process_batch(&envelopes, None).await;

        assert_eq!(
            report.stats,
            BatchStats {
                envelopes: 3,
                applied: 1,
                skipped: 1,
                permanent: 1,
                retriable: 0,
            }
        );
        assert_eq!(report.retry_message_ids().count(), 0);
    }

    #[tokio::test]
    async fn passed_deadline_marks_everything_retriable() {
        let repo = InMemoryRecordRepository::new(true);
        repo.insert(Record::pending("r1", "u1", 1));

        let envelopes = vec![
            QueueEnvelope::new("m-1", body(&["videos/u1_r1_1_a.mp4"])),
            QueueEnvelope::new("m-2", body(&["videos/u1_r1_1_a.mp4"])),
        ];
        let report = processor(&repo)
            .process_batch(&envelopes, Some(Instant::now()))
            .await;

        let retry: Vec<&str> = report.retry_message_ids().collect();
        assert_eq!(retry, vec!["m-1", "m-2"]);
        assert_eq!(repo.update_calls(), 0);
    }
}
