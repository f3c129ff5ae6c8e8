//! In-memory record store.
//!
//! Same update semantics as the DynamoDB backend, plus scripted failures so
//! the pipeline's retry classification can be exercised without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use highlight_core::{Record, StatusUpdate, StoreError};

use crate::repository::{require_owner_id, RecordRepository};

/// Scripted failure for the next update of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Behaves like throttling: retriable.
    Unavailable,
    /// Behaves like a validation error: permanent.
    Rejected,
    /// Never answers. For deadline handling.
    Hang,
}

#[derive(Clone, Default)]
pub struct InMemoryRecordRepository {
    records: Arc<Mutex<HashMap<String, Record>>>,
    faults: Arc<Mutex<HashMap<String, VecDeque<Fault>>>>,
    update_calls: Arc<AtomicUsize>,
    require_existing: bool,
}

impl InMemoryRecordRepository {
    pub fn new(require_existing: bool) -> Self {
        Self {
            require_existing,
            ..Self::default()
        }
    }

    pub fn insert(&self, record: Record) {
        lock(&self.records).insert(record.record_id.clone(), record);
    }

    /// Queue a failure for the next update of `record_id`. Faults queue up in order.
    pub fn fail_next(&self, record_id: &str, fault: Fault) {
        lock(&self.faults)
            .entry(record_id.to_string())
            .or_default()
            .push_back(fault);
    }

    /// Number of `update_status` calls that reached the store, failed or not.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, record_id: &str) -> Option<Record> {
        lock(&self.records).get(record_id).cloned()
    }

    fn take_fault(&self, record_id: &str) -> Option<Fault> {
        lock(&self.faults)
            .get_mut(record_id)
            .and_then(VecDeque::pop_front)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn update_status(&self, update: &StatusUpdate) -> Result<Record, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        match self.take_fault(&update.record_id) {
            Some(Fault::Unavailable) => {
                return Err(StoreError::retriable(anyhow!(
                    "ProvisionedThroughputExceededException: simulated throttling"
                )))
            }
            Some(Fault::Rejected) => {
                return Err(StoreError::permanent(anyhow!(
                    "ValidationException: simulated rejection"
                )))
            }
            Some(Fault::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let mut records = lock(&self.records);
        if self.require_existing && !records.contains_key(&update.record_id) {
            return Err(StoreError::NotFound(update.record_id.clone()));
        }
        let record = records
            .entry(update.record_id.clone())
            .or_insert_with(|| Record {
                record_id: update.record_id.clone(),
                owner_id: None,
                status: update.status,
                uploaded_size: None,
                updated_at: None,
                created_at: None,
            });
        record.apply(update);
        Ok(record.clone())
    }

    async fn get(&self, record_id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.snapshot(record_id))
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        require_owner_id(owner_id)?;
        let mut owned: Vec<Record> = lock(&self.records)
            .values()
            .filter(|r| r.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}
