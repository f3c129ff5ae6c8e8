pub mod notification;
pub mod record;

pub use notification::{
    StorageBucket, StorageEntity, StorageEventEnvelope, StorageEventRecord, StorageObject,
    UploadNotification,
};
pub use record::{Record, RecordStatus, StatusUpdate};
