use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Lifecycle state of an uploaded asset.
///
/// This pipeline only ever writes `Uploaded`; `Processing` and `Failed` belong
/// to downstream processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Pending,
    Uploaded,
    Processing,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Uploaded => "UPLOADED",
            RecordStatus::Processing => "PROCESSING",
            RecordStatus::Failed => "FAILED",
        }
    }
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RecordStatus::Pending),
            "UPLOADED" => Ok(RecordStatus::Uploaded),
            "PROCESSING" => Ok(RecordStatus::Processing),
            "FAILED" => Ok(RecordStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid record status: {}", s)),
        }
    }
}

/// Persisted uploaded asset, as stored in the records table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_size: Option<u64>,
    /// Seconds since epoch of the last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Record {
    /// A freshly created record awaiting its upload.
    pub fn pending(record_id: impl Into<String>, owner_id: impl Into<String>, created_at: i64) -> Self {
        Self {
            record_id: record_id.into(),
            owner_id: Some(owner_id.into()),
            status: RecordStatus::Pending,
            uploaded_size: None,
            updated_at: None,
            created_at: Some(created_at),
        }
    }

    /// Apply a status update in place. Last write wins.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.uploaded_size = Some(update.uploaded_size);
        self.updated_at = Some(update.updated_at);
    }
}

/// Field set written by the upload-completion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub record_id: String,
    pub status: RecordStatus,
    pub uploaded_size: u64,
    pub updated_at: i64,
}

impl StatusUpdate {
    pub fn uploaded(record_id: impl Into<String>, uploaded_size: u64, updated_at: i64) -> Self {
        Self {
            record_id: record_id.into(),
            status: RecordStatus::Uploaded,
            uploaded_size,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RecordStatus::Pending,
            RecordStatus::Uploaded,
            RecordStatus::Processing,
            RecordStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<RecordStatus>().unwrap(), status);
        }
        assert!("uploaded".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn apply_is_idempotent() {
        let update = StatusUpdate::uploaded("rec42", 1048576, 1_700_000_000);
        let mut once = Record::pending("rec42", "u1", 1_699_999_000);
        once.apply(&update);
        let mut twice = once.clone();
        twice.apply(&update);

        assert_eq!(once, twice);
        assert_eq!(twice.status, RecordStatus::Uploaded);
        assert_eq!(twice.uploaded_size, Some(1048576));
        assert_eq!(twice.updated_at, Some(1_700_000_000));
        assert_eq!(twice.created_at, Some(1_699_999_000));
    }

    #[test]
    fn serializes_with_table_attribute_names() {
        let record = Record::pending("rec42", "u1", 5);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["recordId"], "rec42");
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("uploadedSize").is_none());
    }
}
