//! Shared name generation for session directories, parts and artifacts.

use mediaload_core::ErrorMetadata;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Width of the zero-padded part index.
pub const PART_INDEX_WIDTH: usize = 5;

const STAGING_SUFFIX: &str = ".partial";

/// Reject session ids that could escape the upload directory.
pub fn validate_session_id(session_id: &str) -> StorageResult<()> {
    mediaload_core::UploadSession::validate_session_id(session_id)
        .map_err(|e| StorageError::InvalidKey(e.client_message()))
}

/// `{session_id}_{index:05}`
pub fn part_file_name(session_id: &str, index: u32) -> String {
    format!("{}_{:0width$}", session_id, index, width = PART_INDEX_WIDTH)
}

/// Hidden, per-writer name a part is written under before it is renamed into place.
///
/// The leading dot keeps it out of the session prefix count.
pub fn staging_name(part_name: &str) -> String {
    format!(".{}.{}{}", part_name, Uuid::new_v4().simple(), STAGING_SUFFIX)
}

/// Case-insensitive session prefix match used for completion counting.
pub fn has_session_prefix(session_id: &str, file_name: &str) -> bool {
    file_name
        .to_lowercase()
        .starts_with(&session_id.to_lowercase())
}

/// Parse the index of a part file belonging to `session_id`.
///
/// Only names of the exact form `{session_id}_{digits}` are parts.
pub fn parse_part_index(session_id: &str, file_name: &str) -> Option<u32> {
    let digits = file_name.strip_prefix(session_id)?.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Fresh stored filename `{uuid}.{ext}` (no dot when `ext` is empty).
pub fn stored_file_name(ext: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    if ext.is_empty() {
        id
    } else {
        format!("{}.{}", id, ext.to_lowercase())
    }
}

/// Reduce an untrusted filename to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX: usize = 255;
    let base = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    if base.contains("..") {
        return "upload".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "upload".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_names_sort_numerically() {
        let mut names: Vec<String> = [10u32, 2, 0, 1].iter().map(|i| part_file_name("s", *i)).collect();
        names.sort();
        assert_eq!(names, vec!["s_00000", "s_00001", "s_00002", "s_00010"]);
    }

    #[test]
    fn test_parse_part_index() {
        assert_eq!(parse_part_index("abc", "abc_00042"), Some(42));
        assert_eq!(parse_part_index("abc", "abc_"), None);
        assert_eq!(parse_part_index("abc", "abc_12x"), None);
        assert_eq!(parse_part_index("abc", "abcd_00001"), None);
        assert_eq!(parse_part_index("abc", ".abc_00001.partial"), None);
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        assert!(has_session_prefix("AbC", "abc_00001"));
        assert!(has_session_prefix("abc", "ABC_00001"));
        assert!(!has_session_prefix("abc", staging_name("abc_00001").as_str()));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("holiday photo.jpg"), "holiday_photo.jpg");
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn test_stored_file_name() {
        let name = stored_file_name("JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 32 + 4);
        assert!(!stored_file_name("").contains('.'));
    }
}
