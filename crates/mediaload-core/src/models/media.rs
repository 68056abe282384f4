use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Processing category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    StaticImage,
    AnimatedImage,
    /// Image format that must be converted to PNG before it can be decoded.
    OtherImage,
    Video,
    Audio,
    Unsupported,
}

impl MediaCategory {
    /// Categories the in-process thumbnail routine can handle.
    pub fn is_thumbnail_eligible(&self) -> bool {
        matches!(self, MediaCategory::StaticImage | MediaCategory::AnimatedImage)
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaCategory::StaticImage => "static_image",
            MediaCategory::AnimatedImage => "animated_image",
            MediaCategory::OtherImage => "other_image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Thumbnail derived from a media artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailArtifact {
    pub guid: String,
    pub filename: String,
    pub url: String,
    pub content_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub local_path: PathBuf,
}

/// Result of processing a finished upload, handed to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaArtifact {
    pub guid: String,
    pub original_filename: String,
    /// Stored filename; for video/audio this carries the canonical extension.
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
    pub category: MediaCategory,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// A transcode is logically outstanding for this artifact.
    pub processing: bool,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub duration_text: Option<String>,
    pub thumbnail: Option<ThumbnailArtifact>,
    /// File on disk holding the (unconverted) artifact bytes.
    pub local_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl MediaArtifact {
    /// Artifact carrying only identity and storage fields.
    pub fn new(
        guid: impl Into<String>,
        original_filename: impl Into<String>,
        filename: impl Into<String>,
        url: impl Into<String>,
        local_path: PathBuf,
    ) -> Self {
        Self {
            guid: guid.into(),
            original_filename: original_filename.into(),
            filename: filename.into(),
            url: url.into(),
            content_type: None,
            category: MediaCategory::Unsupported,
            size_bytes: 0,
            width: None,
            height: None,
            processing: false,
            duration: None,
            duration_text: None,
            thumbnail: None,
            local_path,
            created_at: Utc::now(),
        }
    }
}
