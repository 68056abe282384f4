//! Mediaload core
//!
//! Shared configuration, error types, domain models and host callbacks used by
//! the storage, processing, services and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;

pub use config::{Config, ServerConfig, StorageConfig, ToolConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{LoggingHooks, MediaHooks, NoOpMediaHooks};
pub use models::{
    MediaArtifact, MediaCategory, PartUpload, SessionState, ThumbnailArtifact, UploadSession,
};
