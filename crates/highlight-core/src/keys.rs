//! Object key naming convention for uploaded assets.
//!
//! Key format: `{prefix}/{owner_id}_{record_id}_{timestamp}_{original_name}`,
//! for example `videos/u1_rec42_169900_clip.mp4`. Only the final path segment
//! carries fields; the original name may itself contain `_`.

use crate::error::KeyError;

/// Extract the record id (second `_` field of the final path segment).
///
/// Pure function of the key. Keys with fewer than two fields, or an empty
/// record id field, are malformed and will never parse on redelivery.
pub fn record_id_from_key(key: &str) -> Result<&str, KeyError> {
    let file_name = file_name(key);
    let mut fields = file_name.split('_');
    fields.next();
    match fields.next() {
        Some(record_id) if !record_id.is_empty() => Ok(record_id),
        Some(_) => Err(KeyError::Malformed {
            key: key.to_string(),
            reason: "record id field is empty",
        }),
        None => Err(KeyError::Malformed {
            key: key.to_string(),
            reason: "expected at least two '_'-separated fields",
        }),
    }
}

/// Decode a key as it appears in an S3 event notification.
///
/// S3 form-encodes keys in notifications: `+` is a space and other reserved
/// bytes are `%XX` escapes.
pub fn decode_event_key(raw: &str) -> Result<String, KeyError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| KeyError::InvalidEncoding {
            key: raw.to_string(),
        })
}

fn file_name(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// All positional fields of an upload key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKey {
    pub prefix: String,
    pub owner_id: String,
    pub record_id: String,
    pub timestamp: Option<String>,
    pub original_name: Option<String>,
}

impl UploadKey {
    pub fn new(
        prefix: impl Into<String>,
        owner_id: impl Into<String>,
        record_id: impl Into<String>,
        timestamp: i64,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            owner_id: owner_id.into(),
            record_id: record_id.into(),
            timestamp: Some(timestamp.to_string()),
            original_name: Some(original_name.into()),
        }
    }

    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let record_id = record_id_from_key(key)?.to_string();
        let prefix = key.rsplit_once('/').map_or("", |(prefix, _)| prefix);

        let mut fields = file_name(key).splitn(4, '_');
        let owner_id = fields.next().unwrap_or_default().to_string();
        fields.next();
        let timestamp = fields.next().map(str::to_string);
        let original_name = fields.next().map(str::to_string);

        Ok(Self {
            prefix: prefix.to_string(),
            owner_id,
            record_id,
            timestamp,
            original_name,
        })
    }

    pub fn format(&self) -> String {
        let mut name = format!("{}_{}", self.owner_id, self.record_id);
        if let Some(ts) = &self.timestamp {
            name.push('_');
            name.push_str(ts);
        }
        if let Some(original) = &self.original_name {
            name.push('_');
            name.push_str(original);
        }

        if self.prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}
