//! Media type tables and processing constants

/// Default thumbnail width in pixels.
pub const THUMBNAIL_WIDTH: u32 = 500;

/// Sources larger than this are downscaled before orientation correction.
pub const ROTATE_DOWNSCALE_THRESHOLD_BYTES: u64 = 3_000_000;

/// Width used when downscaling large sources before rotation.
pub const ROTATE_MAX_WIDTH: u32 = 2048;

pub const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const GIF_CONTENT_TYPE: &str = "image/gif";

pub const CANONICAL_VIDEO_EXT: &str = "mp4";
pub const CANONICAL_AUDIO_EXT: &str = "mp3";
pub const CANONICAL_AUDIO_CONTENT_TYPE: &str = "audio/mp3";

/// Suffix appended to an artifact guid to form its thumbnail guid.
pub const THUMBNAIL_GUID_SUFFIX: &str = "thumbnail";

pub const STATIC_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "pjpeg", "png", "jfif", "dms", "img"];

pub const READABLE_IMAGE_TYPES: &[&str] = &[
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/wbmp",
];

pub const GIF_EXTENSION: &str = "gif";

pub const IMAGE_TYPES: &[&str] = &[
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/svg+xml",
    "image/tiff",
    "image/vnd.ms-photo",
    "image/webp",
    "image/x-ms-bmp",
    "image/heic",
    "image/heif",
];

pub const HEIF_TYPES: &[&str] = &["image/heic", "image/heif"];

pub const AUDIO_TYPES: &[&str] = &[
    "audio/mp3",
    "audio/mpeg",
    "audio/m4a",
    "audio/mp4",
    "audio/x-m4a",
    "audio/wav",
    "audio/x-wav",
    "audio/x-ms-wma",
    "video/x-ms-asf",
];

pub const VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/mov",
    "video/quicktime",
    "video/m4v",
    "video/x-m4v",
    "video/x-ms-wmv",
];

/// Content type to file extension, used when an upload carries no extension.
pub const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("audio/mp3", "mp3"),
    ("audio/mpeg", "mp3"),
    ("video/mp4", "mp4"),
    ("video/mov", "mov"),
    ("video/quicktime", "mov"),
    ("audio/m4a", "m4a"),
    ("audio/x-m4a", "m4a"),
    ("video/m4v", "m4v"),
    ("video/x-m4v", "m4v"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
    ("image/heic", "heic"),
];

/// Look up the extension registered for a content type.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let normalized = normalize_content_type(content_type);
    CONTENT_TYPE_EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == normalized)
        .map(|(_, ext)| *ext)
}

/// Lowercase a MIME type and strip parameters ("image/jpeg; q=1" -> "image/jpeg").
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// True for absent, empty or generic octet-stream content types.
pub fn is_generic_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let normalized = normalize_content_type(ct);
            normalized.is_empty() || normalized == GENERIC_CONTENT_TYPE
        }
    }
}
