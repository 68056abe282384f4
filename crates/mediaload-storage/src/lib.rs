//! Mediaload Storage Library
//!
//! Local filesystem storage for chunked uploads.
//!
//! # Layout
//!
//! - Session parts: `{upload_dir}/{session_id}/{session_id}_{index:05}`
//! - Finished artifacts: `{upload_dir}/{uuid}.{ext}`
//!
//! Part names are zero-padded so lexicographic and numeric order agree. Name
//! generation is centralized in the `keys` module.

pub mod error;
pub mod keys;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStore, PartWritten, StoredFile};
