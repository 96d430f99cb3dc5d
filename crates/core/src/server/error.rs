//! Server-side error types

use thiserror::Error;
use tracelane_domain::TracelaneError;

/// Failures while turning a job into buffered records.
///
/// The ingest loop logs these and removes the job anyway.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to decrypt payload: {0}")]
    Decrypt(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    /// A record without an event type cannot be routed to a processor.
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),

    #[error("job queue error: {0}")]
    Queue(#[source] TracelaneError),

    #[error("batch write failed: {0}")]
    Write(#[source] TracelaneError),
}

impl From<IngestError> for TracelaneError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Decrypt(_) => TracelaneError::Security(err.to_string()),
            IngestError::Decode(_) | IngestError::UnknownEventType(_) => {
                TracelaneError::InvalidInput(err.to_string())
            }
            IngestError::Queue(inner) | IngestError::Write(inner) => inner,
        }
    }
}

/// Lifecycle errors of background loops.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Task join failed: {0}")]
    JoinFailed(String),

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl From<SchedulerError> for TracelaneError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                TracelaneError::InvalidInput(err.to_string())
            }
            _ => TracelaneError::Internal(err.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_errors_map_onto_domain_errors() {
        let err: TracelaneError = IngestError::Decrypt("bad tag".into()).into();
        assert!(matches!(err, TracelaneError::Security(_)));

        let err: TracelaneError =
            IngestError::Write(TracelaneError::Database("locked".into())).into();
        assert_eq!(err, TracelaneError::Database("locked".into()));
    }

    #[test]
    fn lifecycle_misuse_is_invalid_input() {
        let err: TracelaneError = SchedulerError::AlreadyRunning.into();
        assert!(matches!(err, TracelaneError::InvalidInput(_)));
        assert_eq!(SchedulerError::Timeout { seconds: 5 }.to_string(), "Operation timed out after 5s");
    }
}
