//! Media type classification
//!
//! Maps a declared content type and file extension to a [`MediaCategory`].
//! Uploads without a usable content type are sniffed by filename and magic
//! bytes first.

use std::path::Path;
use tokio::io::AsyncReadExt;

use mediaload_core::constants::{
    extension_for_content_type, is_generic_content_type, normalize_content_type, AUDIO_TYPES,
    GIF_CONTENT_TYPE, GIF_EXTENSION, IMAGE_TYPES, READABLE_IMAGE_TYPES, STATIC_IMAGE_EXTENSIONS,
    VIDEO_TYPES,
};
use mediaload_core::MediaCategory;

/// Bytes read from the start of a file for magic number detection.
const SNIFF_HEADER_LEN: usize = 8192;

/// Pure classification over already-known type information.
pub fn classify(content_type: Option<&str>, extension: &str) -> MediaCategory {
    let ext = extension.trim_start_matches('.').to_lowercase();
    let content_type = content_type.map(normalize_content_type);
    let ct = content_type.as_deref().unwrap_or("");

    if STATIC_IMAGE_EXTENSIONS.contains(&ext.as_str()) || READABLE_IMAGE_TYPES.contains(&ct) {
        MediaCategory::StaticImage
    } else if ext == GIF_EXTENSION || ct == GIF_CONTENT_TYPE {
        MediaCategory::AnimatedImage
    } else if VIDEO_TYPES.contains(&ct) {
        MediaCategory::Video
    } else if AUDIO_TYPES.contains(&ct) {
        MediaCategory::Audio
    } else if IMAGE_TYPES.contains(&ct) {
        MediaCategory::OtherImage
    } else {
        MediaCategory::Unsupported
    }
}

/// Guesses a content type from a filename and the leading bytes of a file.
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, filename: &str, header: &[u8]) -> Option<String>;
}

/// Filename lookup via `mime_guess`, then magic bytes via `infer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, filename: &str, header: &[u8]) -> Option<String> {
        let by_name = mime_guess::from_path(filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .filter(|ct| !is_generic_content_type(Some(ct.as_str())));

        by_name.or_else(|| infer::get(header).map(|kind| kind.mime_type().to_string()))
    }
}

/// Resolved type information for a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Normalized content type, if one was declared or detected.
    pub content_type: Option<String>,
    /// Lowercase extension without the dot; empty when unknown.
    pub extension: String,
    pub category: MediaCategory,
}

pub struct MediaClassifier {
    sniffer: Box<dyn ContentSniffer>,
}

impl Default for MediaClassifier {
    fn default() -> Self {
        Self::new(Box::new(MagicSniffer))
    }
}

impl MediaClassifier {
    pub fn new(sniffer: Box<dyn ContentSniffer>) -> Self {
        Self { sniffer }
    }

    /// Classify the file at `path`, sniffing when the declared type is missing or generic.
    ///
    /// An empty `extension` is taken from `filename`, then from the content type.
    pub async fn resolve(
        &self,
        declared_content_type: Option<&str>,
        filename: &str,
        extension: &str,
        path: &Path,
    ) -> Classification {
        let mut content_type = declared_content_type
            .filter(|ct| !is_generic_content_type(Some(*ct)))
            .map(normalize_content_type);

        if content_type.is_none() {
            let header = read_header(path).await;
            content_type = self.sniffer.sniff(filename, &header).map(|ct| normalize_content_type(&ct));
            tracing::debug!(
                filename = %filename,
                sniffed = ?content_type,
                "Content type sniffed"
            );
        }

        let mut extension = extension.trim_start_matches('.').to_lowercase();
        if extension.is_empty() {
            extension = Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
        }
        if extension.is_empty() {
            if let Some(ext) = content_type.as_deref().and_then(extension_for_content_type) {
                extension = ext.to_string();
            }
        }

        let category = classify(content_type.as_deref(), &extension);
        Classification {
            content_type,
            extension,
            category,
        }
    }
}

async fn read_header(path: &Path) -> Vec<u8> {
    let mut header = Vec::with_capacity(SNIFF_HEADER_LEN);
    match tokio::fs::File::open(path).await {
        Ok(file) => {
            if let Err(e) = file.take(SNIFF_HEADER_LEN as u64).read_to_end(&mut header).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read file header");
            }
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to open file for sniffing"),
    }
    header
}
