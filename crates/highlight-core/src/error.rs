//! Error types module
//!
//! Errors are split by who can fix them. [`StoreError`] is what a record
//! store backend reports, already classified as retriable or not.
//! [`PipelineError`] is what one notification's trip through the pipeline can
//! end with; [`PipelineError::is_retriable`] is the only place that decides
//! whether the queue should redeliver.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected, permanent input problems (bad keys, stray events)
    Warn,
    /// Failures that need a human (permanent store rejections) or will be retried
    Error,
}

/// Object key does not follow `<prefix>/<ownerId>_<recordId>_<timestamp>_<name>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("malformed object key {key:?}: {reason}")]
    Malformed { key: String, reason: &'static str },

    #[error("object key {key:?} is not valid percent-encoded UTF-8")]
    InvalidEncoding { key: String },
}

impl KeyError {
    pub fn key(&self) -> &str {
        match self {
            KeyError::Malformed { key, .. } | KeyError::InvalidEncoding { key } => key,
        }
    }
}

/// Record store failures, classified by the backend that produced them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unavailable, throttled or timed out. Redelivery may succeed.
    #[error("record store temporarily unavailable: {0}")]
    Retriable(#[source] anyhow::Error),

    /// Store rejected the request itself. Redelivery will not help.
    #[error("record store rejected request: {0}")]
    Permanent(#[source] anyhow::Error),

    /// Guarded update found no record with this id.
    #[error("record not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn retriable(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Retriable(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Permanent(err.into())
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Retriable(_))
    }
}

/// Outcome of a failed attempt to process one envelope or notification.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Envelope body is not a storage event container.
    #[error("failed to decode envelope body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    MalformedKey(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invocation ran out of time before the update was confirmed.
    #[error("invocation deadline reached before the update was confirmed")]
    DeadlineExceeded,
}

impl PipelineError {
    /// Whether the transport should redeliver the envelope that produced this error.
    pub fn is_retriable(&self) -> bool {
        match self {
            PipelineError::Decode(_) | PipelineError::MalformedKey(_) => false,
            PipelineError::Store(e) => e.is_retriable(),
            PipelineError::DeadlineExceeded => true,
        }
    }

    /// Stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::MalformedKey(_) => "malformed_key",
            PipelineError::Store(StoreError::Retriable(_)) => "store_retriable",
            PipelineError::Store(StoreError::Permanent(_)) => "store_permanent",
            PipelineError::Store(StoreError::NotFound(_)) => "record_not_found",
            PipelineError::DeadlineExceeded => "deadline_exceeded",
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::Decode(_) | PipelineError::MalformedKey(_) => LogLevel::Warn,
            PipelineError::Store(_) | PipelineError::DeadlineExceeded => LogLevel::Error,
        }
    }
}
