//! Host application callbacks
//!
//! The assembler and pipeline never persist media records themselves. The host
//! application implements [`MediaHooks`] to receive finished artifacts and to
//! report uploads it has already recorded.

use async_trait::async_trait;

use crate::models::MediaArtifact;

#[async_trait]
pub trait MediaHooks: Send + Sync {
    /// Called once per finished artifact. Returns the host's media id, if any.
    async fn on_media_ready(&self, artifact: MediaArtifact) -> Option<String>;

    /// Returns the media id of a session the host has already recorded.
    ///
    /// A non-empty id short-circuits ingestion, which makes a duplicated final
    /// part harmless.
    async fn check_already_processed(&self, session_id: &str) -> Option<String>;
}

/// Hooks that record nothing
pub struct NoOpMediaHooks;

#[async_trait]
impl MediaHooks for NoOpMediaHooks {
    async fn on_media_ready(&self, _artifact: MediaArtifact) -> Option<String> {
        None
    }

    async fn check_already_processed(&self, _session_id: &str) -> Option<String> {
        None
    }
}

/// Hooks that log each artifact and use its guid as the media id.
pub struct LoggingHooks;

#[async_trait]
impl MediaHooks for LoggingHooks {
    async fn on_media_ready(&self, artifact: MediaArtifact) -> Option<String> {
        tracing::info!(
            guid = %artifact.guid,
            filename = %artifact.filename,
            category = %artifact.category,
            size_bytes = artifact.size_bytes,
            width = ?artifact.width,
            height = ?artifact.height,
            processing = artifact.processing,
            has_thumbnail = artifact.thumbnail.is_some(),
            "Media ready"
        );
        Some(artifact.guid)
    }

    async fn check_already_processed(&self, _session_id: &str) -> Option<String> {
        None
    }
}
