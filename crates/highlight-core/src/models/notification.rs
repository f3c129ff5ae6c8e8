//! Storage-completion event schema.
//!
//! The queue message body is an S3 event notification:
//! `{"Records":[{"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":..},"object":{"key":..,"size":..}}}]}`.
//! Only the fields the pipeline needs are modelled; `name`, `key` and `size`
//! are required so a truncated event is a decode error rather than a zero.

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, PipelineError};
use crate::keys::decode_event_key;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageEventEnvelope {
    /// Absent on `s3:TestEvent` messages and anything that is not a storage event.
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageEventRecord {
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: StorageEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageEntity {
    pub bucket: StorageBucket,
    pub object: StorageObject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageBucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageObject {
    /// Form-encoded as S3 sends it.
    pub key: String,
    pub size: u64,
}

impl StorageEventEnvelope {
    pub fn from_body(body: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(body).map_err(PipelineError::Decode)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StorageEventRecord {
    /// Whether this record reports a completed upload. Records without an
    /// event name are treated as uploads.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .map_or(true, |name| name.starts_with("ObjectCreated:"))
    }
}

/// One completed upload, ready for the key decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadNotification {
    pub bucket_name: String,
    /// Decoded object key.
    pub object_key: String,
    pub byte_size: u64,
}

impl TryFrom<StorageEventRecord> for UploadNotification {
    type Error = KeyError;

    fn try_from(record: StorageEventRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            object_key: decode_event_key(&record.s3.object.key)?,
            bucket_name: record.s3.bucket.name,
            byte_size: record.s3.object.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_storage_event() {
        let body = r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{"key":"videos/u1_rec42_169900_clip.mp4","size":1048576}}}]}"#;
        let envelope = StorageEventEnvelope::from_body(body).unwrap();
        assert_eq!(envelope.records.len(), 1);

        let notification =
            UploadNotification::try_from(envelope.records.into_iter().next().unwrap()).unwrap();
        assert_eq!(
            notification,
            UploadNotification {
                bucket_name: "b".to_string(),
                object_key: "videos/u1_rec42_169900_clip.mp4".to_string(),
                byte_size: 1048576,
            }
        );
    }

    #[test]
    fn only_object_created_events_are_uploads() {
        let body = r#"{"Records":[
            {"eventName":"ObjectCreated:CompleteMultipartUpload","s3":{"bucket":{"name":"b"},"object":{"key":"k","size":1}}},
            {"eventName":"ObjectRemoved:Delete","s3":{"bucket":{"name":"b"},"object":{"key":"k","size":0}}},
            {"s3":{"bucket":{"name":"b"},"object":{"key":"k","size":1}}}
        ]}"#;
        let envelope = StorageEventEnvelope::from_body(body).unwrap();
        let created: Vec<bool> = envelope
            .records
            .iter()
            .map(StorageEventRecord::is_object_created)
            .collect();
        assert_eq!(created, vec![true, false, true]);
    }

    #[test]
    fn missing_records_is_empty_not_an_error() {
        let test_event = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"b"}"#;
        assert!(StorageEventEnvelope::from_body(test_event).unwrap().is_empty());
        assert!(StorageEventEnvelope::from_body(r#"{"Records":[]}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_size_is_a_decode_error() {
        let body = r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{"key":"videos/u1_r_1_a"}}}]}"#;
        let err = StorageEventEnvelope::from_body(body).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(
            StorageEventEnvelope::from_body("not json"),
            Err(PipelineError::Decode(_))
        ));
        assert!(StorageEventEnvelope::from_body("[1,2]").is_err());
    }

    #[test]
    fn notification_key_is_decoded() {
        let record = StorageEventRecord {
            event_name: Some("ObjectCreated:Put".to_string()),
            s3: StorageEntity {
                bucket: StorageBucket {
                    name: "b".to_string(),
                },
                object: StorageObject {
                    key: "videos/u1_rec42_1_my+clip.mp4".to_string(),
                    size: 10,
                },
            },
        };
        let notification = UploadNotification::try_from(record).unwrap();
        assert_eq!(notification.object_key, "videos/u1_rec42_1_my clip.mp4");
    }
}
