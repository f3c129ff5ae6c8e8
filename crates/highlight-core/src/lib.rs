//! Highlight Core Library
//!
//! Domain models, error types, object key decoding, clock and configuration
//! shared by the upload-completion worker, the record store and the CLI.

pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LogFormat, RecordStoreBackend, WorkerConfig};
pub use error::{KeyError, LogLevel, PipelineError, StoreError};
pub use keys::{record_id_from_key, UploadKey};
pub use models::{Record, RecordStatus, StatusUpdate, UploadNotification};
