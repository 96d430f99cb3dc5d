//! Client-side error types
//!
//! None of these ever reach the host application: the transport handles each
//! where it occurs and reports it through structured logs.

use std::time::Duration;

use thiserror::Error;
use tracelane_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use tracelane_domain::PriorityLane;

/// Errors raised while buffering or assembling bundles.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A lane buffer or the scheduler backlog is at capacity.
    #[error("{lane} lane is full (capacity {capacity})")]
    QueueOverflow { lane: PriorityLane, capacity: usize },

    /// No encryption key has been received yet.
    #[error("encryption key not configured")]
    EncryptionNotReady,

    #[error("failed to encode bundle: {0}")]
    Encode(String),

    #[error("invalid client config: {0}")]
    Config(String),

    /// The transport worker has shut down.
    #[error("transport worker stopped")]
    Stopped,

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Categories of send failures for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendErrorCategory {
    /// Connection failures and timeouts - retryable
    Network,
    /// 5xx and 429 responses - retryable
    Server,
    /// 4xx responses - the same bundle will be rejected again
    Client,
    /// The bundle could not be serialized
    Encode,
}

/// Errors returned by a bundle sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Encode error: {0}")]
    Encode(String),
}

impl SendError {
    /// Classify an HTTP status that was not a success.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status >= 500 || status == 429 || status == 408 {
            Self::Server { status, message }
        } else {
            Self::Client { status, message }
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> SendErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) => SendErrorCategory::Network,
            Self::Server { .. } => SendErrorCategory::Server,
            Self::Client { .. } => SendErrorCategory::Client,
            Self::Encode(_) => SendErrorCategory::Encode,
        }
    }

    /// Check if this error should be retried
    pub fn should_retry(&self) -> bool {
        matches!(self.category(), SendErrorCategory::Network | SendErrorCategory::Server)
    }
}

impl ErrorClassification for SendError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            SendErrorCategory::Network | SendErrorCategory::Server => ErrorSeverity::Warning,
            SendErrorCategory::Client | SendErrorCategory::Encode => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }
}
