//! Event Unwrapper: queue envelope -> upload notifications.
//!
//! No I/O. A body that is not JSON, or is JSON of the wrong shape, fails
//! the whole envelope with [`PipelineError::Decode`]. A body with no
//! `Records` is not an error; it just yields nothing. Records for events
//! other than `ObjectCreated:*` are skipped.

use std::vec;

use highlight_core::models::{StorageEventEnvelope, StorageEventRecord};
use highlight_core::{PipelineError, UploadNotification};

use crate::envelope::QueueEnvelope;

/// Lazy sequence of the notifications inside one envelope, in event order.
///
/// Every inner record is yielded, not only the first. Each item fails on its
/// own if its key is not valid percent-encoding.
#[derive(Debug)]
pub struct Notifications {
    records: vec::IntoIter<StorageEventRecord>,
}

impl Notifications {
    fn empty() -> Self {
        Self {
            records: Vec::new().into_iter(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.len() == 0
    }
}

impl Iterator for Notifications {
    type Item = Result<UploadNotification, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .next()
            .map(|record| UploadNotification::try_from(record).map_err(PipelineError::from))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for Notifications {}

pub fn unwrap_envelope(envelope: &QueueEnvelope) -> Result<Notifications, PipelineError> {
    let Some(body) = envelope.body.as_deref() else {
        return Ok(Notifications::empty());
    };

    let event = StorageEventEnvelope::from_body(body)?;
    let records: Vec<StorageEventRecord> = event
        .records
        .into_iter()
        .filter(|record| {
            let created = record.is_object_created();
            if !created {
                tracing::info!(
                    message_id = %envelope.message_id,
                    event_name = record.event_name.as_deref().unwrap_or_default(),
                    object_key = %record.s3.object.key,
                    "Skipping non-upload storage event"
                );
            }
            created
        })
        .collect();

    Ok(Notifications {
        records: records.into_iter(),
    })
}
