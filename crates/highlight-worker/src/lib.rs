//! Upload-completion worker.
//!
//! Consumes S3 upload notifications delivered through SQS and marks the
//! matching records `UPLOADED`. Two transports share one pipeline:
//!
//! - [`handler`]: Lambda SQS event source, answering with a partial-batch
//!   failure list so only retriable envelopes are redelivered.
//! - [`poller`]: long-polling consumer for hosts without Lambda; deletes what
//!   it is done with and releases the rest with backoff.
//!
//! Every envelope goes through [`unwrap`] -> key decoding -> [`updater`],
//! sequentially and independently, driven by [`batch::BatchProcessor`].

pub mod batch;
pub mod envelope;
pub mod handler;
pub mod poller;
pub mod queue;
pub mod setup;
pub mod telemetry;
pub mod unwrap;
pub mod updater;

pub use batch::{BatchProcessor, BatchReport, BatchStats, ItemOutcome};
pub use envelope::QueueEnvelope;
pub use poller::{MessageSource, PollerConfig, QueuePoller};
pub use updater::StatusUpdater;
