use mediaload_core::AppError;

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Size mismatch: expected {expected} bytes, wrote {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Missing part {index}")]
    MissingPart { index: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Errors that leave a session's parts inconsistent with its declaration.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            StorageError::SizeMismatch { .. } | StorageError::MissingPart { .. }
        )
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::SizeMismatch { .. } | StorageError::MissingPart { .. } => {
                AppError::Integrity(err.to_string())
            }
            other => AppError::Io(other.to_string()),
        }
    }
}
