//! Error types module
//!
//! All request-level failures are unified under [`AppError`]. Only the
//! validation, I/O and integrity variants ever reach a client; tool failures
//! and unsupported media are absorbed by the processing pipeline and exist
//! here so they can be logged and classified consistently.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a corrupt upload
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INTEGRITY_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the same request can be retried)
    fn is_recoverable(&self) -> bool;

    /// Whether the client must restart its chunk sequence from part 0
    fn requires_reset(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("External tool failed: {0}")]
    ToolFailure(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Whether this error aborts the request instead of degrading the result.
    pub fn is_request_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::ToolFailure(_) | AppError::UnsupportedMedia(_)
        )
    }

    /// Variant name used as a structured log field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::Io(_) => "Io",
            AppError::Integrity(_) => "Integrity",
            AppError::ToolFailure(_) => "ToolFailure",
            AppError::UnsupportedMedia(_) => "UnsupportedMedia",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "InternalWithSource",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata per variant: (http_status, error_code, recoverable, reset, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Validation(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::Io(_) => (500, "IO_ERROR", true, false, LogLevel::Error),
        AppError::Integrity(_) => (409, "INTEGRITY_ERROR", true, true, LogLevel::Warn),
        AppError::ToolFailure(_) => (500, "TOOL_FAILURE", false, false, LogLevel::Warn),
        AppError::UnsupportedMedia(_) => (415, "UNSUPPORTED_MEDIA", false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, false, LogLevel::Error)
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn requires_reset(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Integrity(msg) => msg.clone(),
            AppError::NotFound(msg) => format!("Not found: {}", msg),
            AppError::UnsupportedMedia(msg) => format!("Unsupported media: {}", msg),
            AppError::Io(_) => "Failed to store upload".to_string(),
            AppError::ToolFailure(_) => "Media processing failed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_requires_reset() {
        let err = AppError::Integrity("Incorrect combined file size".to_string());
        assert!(err.requires_reset());
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.client_message(), "Incorrect combined file size");
    }

    #[test]
    fn test_only_request_level_errors_are_fatal() {
        assert!(AppError::Validation("x".into()).is_request_fatal());
        assert!(AppError::Io("x".into()).is_request_fatal());
        assert!(AppError::Integrity("x".into()).is_request_fatal());
        assert!(!AppError::ToolFailure("x".into()).is_request_fatal());
        assert!(!AppError::UnsupportedMedia("x".into()).is_request_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(!err.requires_reset());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_validation_hides_nothing() {
        let err = AppError::Validation("qqtotalfilesize is not a number".into());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.client_message(), "qqtotalfilesize is not a number");
    }
}
