use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

const MAX_SESSION_ID_LEN: usize = 128;

/// One logical upload, correlated across parts by a client-generated id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    /// `None` for whole-file uploads that never touch the part directory.
    pub total_parts: Option<u32>,
    pub total_size: Option<u64>,
    pub filename: String,
    /// Skip EXIF-derived auto-rotation.
    pub keep_original: bool,
}

impl UploadSession {
    /// Validate the untrusted session id before it is used to derive any path.
    pub fn validate_session_id(session_id: &str) -> Result<(), AppError> {
        if session_id.is_empty() {
            return Err(AppError::Validation("Session id is required".to_string()));
        }
        if session_id.len() > MAX_SESSION_ID_LEN {
            return Err(AppError::Validation(format!(
                "Session id exceeds {} characters",
                MAX_SESSION_ID_LEN
            )));
        }
        if !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::Validation(
                "Session id contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_chunked(&self) -> bool {
        self.total_parts.is_some()
    }

    /// Lowercased extension of the target filename, empty when there is none.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }
}

/// A single part (or a whole file) as delivered by the transport.
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub session: UploadSession,
    /// `None` for whole-file uploads.
    pub part_index: Option<u32>,
    pub declared_part_size: Option<u64>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Lifecycle of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Collecting,
    Merging,
    Verifying,
    Complete,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Collecting => "collecting",
            SessionState::Merging => "merging",
            SessionState::Verifying => "verifying",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(filename: &str) -> UploadSession {
        UploadSession {
            session_id: "abc".to_string(),
            total_parts: Some(2),
            total_size: Some(10),
            filename: filename.to_string(),
            keep_original: false,
        }
    }

    #[test]
    fn test_session_id_validation() {
        assert!(UploadSession::validate_session_id("0f8fad5b-d9cb-469f-a165-70867728950e").is_ok());
        assert!(UploadSession::validate_session_id("").is_err());
        assert!(UploadSession::validate_session_id("../etc").is_err());
        assert!(UploadSession::validate_session_id("a/b").is_err());
        assert!(UploadSession::validate_session_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(session("Photo.JPG").extension(), "jpg");
        assert_eq!(session("archive.tar.gz").extension(), "gz");
        assert_eq!(session("README").extension(), "");
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Complete.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Merging.is_terminal());
        assert_eq!(SessionState::Verifying.to_string(), "verifying");
    }
}
