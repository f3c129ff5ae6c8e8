#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use highlight_core::{FixedClock, Record};
use highlight_db::InMemoryRecordRepository;
use highlight_worker::{BatchProcessor, MessageSource, QueueEnvelope, StatusUpdater};

pub const FIXED_NOW: i64 = 1_700_000_000;
pub const DEADLINE_MARGIN: Duration = Duration::from_millis(50);

pub struct TestPipeline {
    pub repo: InMemoryRecordRepository,
    pub processor: Arc<BatchProcessor>,
}

impl TestPipeline {
    /// Seed a pending record owned by `u1`.
    pub fn seed(&self, record_id: &str) {
        self.repo.insert(Record::pending(record_id, "u1", FIXED_NOW - 3600));
    }
}

/// In-memory store with default (upsert) semantics, fixed clock.
pub fn setup_pipeline() -> TestPipeline {
    pipeline_with(InMemoryRecordRepository::new(false))
}

/// Store that refuses to update records it does not hold.
pub fn setup_guarded_pipeline() -> TestPipeline {
    pipeline_with(InMemoryRecordRepository::new(true))
}

pub fn pipeline_with(repo: InMemoryRecordRepository) -> TestPipeline {
    let updater = StatusUpdater::new(Arc::new(repo.clone()), Arc::new(FixedClock(FIXED_NOW)));
    TestPipeline {
        repo,
        processor: Arc::new(BatchProcessor::new(updater, DEADLINE_MARGIN)),
    }
}

/// Storage event body carrying one record per `(key, size)`.
pub fn s3_body(objects: &[(&str, u64)]) -> String {
    let records: Vec<serde_json::Value> = objects
        .iter()
        .map(|(key, size)| {
            serde_json::json!({
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "highlight-uploads" },
                    "object": { "key": key, "size": size }
                }
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

pub fn envelope(message_id: &str, objects: &[(&str, u64)]) -> QueueEnvelope {
    QueueEnvelope::new(message_id, s3_body(objects))
}

/// Envelope as the poller sees it, with a receipt handle and delivery count.
pub fn received(message_id: &str, objects: &[(&str, u64)], receive_count: u32) -> QueueEnvelope {
    QueueEnvelope {
        receipt_handle: Some(format!("rh-{message_id}")),
        receive_count: Some(receive_count),
        ..envelope(message_id, objects)
    }
}

/// In-memory queue: hands out scripted batches, then empty receives.
#[derive(Default)]
pub struct ScriptedSource {
    batches: Mutex<VecDeque<anyhow::Result<Vec<QueueEnvelope>>>>,
    acknowledged: Mutex<Vec<String>>,
    released: Mutex<Vec<(String, Duration)>>,
    receive_delay: Duration,
}

impl ScriptedSource {
    pub fn with_batches(batches: Vec<Vec<QueueEnvelope>>) -> Self {
        let source = Self::default();
        source
            .batches
            .lock()
            .unwrap()
            .extend(batches.into_iter().map(Ok));
        source
    }

    /// Every receive that returns messages first waits this long, like a
    /// long poll answered late in its wait.
    pub fn with_receive_delay(mut self, delay: Duration) -> Self {
        self.receive_delay = delay;
        self
    }

    pub fn push_error(&self, message: &str) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<(String, Duration)> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn receive(&self) -> anyhow::Result<Vec<QueueEnvelope>> {
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => {
                tokio::time::sleep(self.receive_delay).await;
                batch
            }
            None => {
                // Stand-in for a long-poll wait that times out.
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, envelopes: &[&QueueEnvelope]) -> anyhow::Result<()> {
        self.acknowledged
            .lock()
            .unwrap()
            .extend(envelopes.iter().map(|e| e.message_id.clone()));
        Ok(())
    }

    async fn release(&self, envelope: &QueueEnvelope, delay: Duration) -> anyhow::Result<()> {
        self.released
            .lock()
            .unwrap()
            .push((envelope.message_id.clone(), delay));
        Ok(())
    }
}
