//! Record store abstraction trait

use async_trait::async_trait;
use highlight_core::{Record, StatusUpdate, StoreError};

/// Record store used by the upload pipeline and the owner listing.
///
/// Backends classify their own failures: [`StoreError::Retriable`] only for
/// conditions a later attempt can get past (throttling, outages, timeouts).
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Set status, uploaded size and update time on one record and return the
    /// record as stored afterwards.
    ///
    /// Last write wins; applying the same update twice leaves the record
    /// unchanged by the second call.
    async fn update_status(&self, update: &StatusUpdate) -> Result<Record, StoreError>;

    async fn get(&self, record_id: &str) -> Result<Option<Record>, StoreError>;

    /// All records owned by `owner_id`, newest first. An empty owner id is a
    /// permanent error.
    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<Record>, StoreError>;
}

/// Reject a blank owner id before it reaches the store.
pub(crate) fn require_owner_id(owner_id: &str) -> Result<(), StoreError> {
    if owner_id.trim().is_empty() {
        return Err(StoreError::permanent(anyhow::anyhow!("owner id must not be empty")));
    }
    Ok(())
}
