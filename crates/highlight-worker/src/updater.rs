//! State Updater: one notification -> one record transition.

use std::sync::Arc;

use highlight_core::{
    record_id_from_key, Clock, PipelineError, Record, StatusUpdate, UploadNotification,
};
use highlight_db::RecordRepository;

/// Marks records `UPLOADED`. Holds no state besides its collaborators, which
/// are built once per process and shared across invocations.
#[derive(Clone)]
pub struct StatusUpdater {
    repository: Arc<dyn RecordRepository>,
    clock: Arc<dyn Clock>,
}

impl StatusUpdater {
    pub fn new(repository: Arc<dyn RecordRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Decode the record id from the key and apply the update.
    ///
    /// A malformed key returns before the store is touched. Store errors come
    /// back as classified by the backend; nothing is retried here.
    #[tracing::instrument(
        skip(self, notification),
        fields(bucket = %notification.bucket_name, object_key = %notification.object_key)
    )]
    pub async fn apply(&self, notification: &UploadNotification) -> Result<Record, PipelineError> {
        let record_id = record_id_from_key(&notification.object_key)?;
        let update = StatusUpdate::uploaded(
            record_id,
            notification.byte_size,
            self.clock.now_epoch_seconds(),
        );

        let record = self.repository.update_status(&update).await?;

        tracing::info!(
            record_id = %record.record_id,
            uploaded_size = notification.byte_size,
            updated_at = update.updated_at,
            "Record marked uploaded"
        );
        Ok(record)
    }
}
