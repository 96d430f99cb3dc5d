//! Common error types shared by every Tracelane crate.
//!
//! [`CommonError`] covers the failures raised by the shared crypto layer:
//! malformed sealed payloads and key or cipher errors.
//! Layer-specific errors embed it rather than duplicating its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum MyLayerError {
//!     #[error("lane buffer is full")]
//!     Full,
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! Every error type should also implement [`ErrorClassification`] so retry
//! decisions and log levels are taken the same way everywhere.

use std::fmt;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Serialization or deserialization errors
    Serialization { message: String, format: String },

    /// Encryption, decryption or key handling errors
    Crypto { message: String },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization { message, format } => {
                write!(f, "Serialization error ({}): {}", format, message)
            }
            Self::Crypto { message } => write!(f, "Crypto error: {}", message),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Crypto { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Crypto { .. })
    }
}

impl CommonError {
    /// Create a serialization error with format information
    pub fn serialization<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: format.into() }
    }

    /// Create a crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto { message: message.into() }
    }
}

/// Error classification trait for consistent error handling across modules
///
/// Retry loops and log-level decisions go through this trait instead of
/// matching on concrete error variants.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as network timeouts or a temporarily unavailable backend.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    #[test]
    fn display_includes_format() {
        assert_eq!(
            CommonError::serialization("JSON", "trailing comma").to_string(),
            "Serialization error (JSON): trailing comma"
        );
        assert_eq!(CommonError::crypto("bad tag").to_string(), "Crypto error: bad tag");
    }

    #[test]
    fn classification_matches_variant() {
        assert!(!CommonError::crypto("bad tag").is_retryable());
        assert!(CommonError::crypto("bad tag").is_critical());
        assert_eq!(CommonError::crypto("bad tag").severity(), ErrorSeverity::Critical);

        let malformed = CommonError::serialization("JSON", "eof");
        assert!(!malformed.is_critical());
        assert_eq!(malformed.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let common: CommonError = err.into();
        assert!(matches!(common, CommonError::Serialization { .. }));
        assert!(common.to_string().contains("JSON"));
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
