//! In-process image transforms
//!
//! Everything here is synchronous and CPU bound. Async callers wrap these calls
//! in `tokio::task::spawn_blocking`.

use image::{DynamicImage, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use mediaload_core::constants::{
    ROTATE_DOWNSCALE_THRESHOLD_BYTES, ROTATE_MAX_WIDTH, THUMBNAIL_WIDTH,
};
use mediaload_core::MediaCategory;

use super::orientation::ImageOrientation;
use super::resize::ImageResize;

#[derive(Debug, thiserror::Error)]
pub enum ImageTransformError {
    #[error("Image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImageTransformError> for mediaload_core::AppError {
    fn from(err: ImageTransformError) -> Self {
        mediaload_core::AppError::UnsupportedMedia(err.to_string())
    }
}

/// Named fixed-width renditions of a static image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeSize {
    Small,
    Medium,
    Large,
    XLarge,
    XXLarge,
}

impl DerivativeSize {
    pub const ALL: [DerivativeSize; 5] = [
        DerivativeSize::Small,
        DerivativeSize::Medium,
        DerivativeSize::Large,
        DerivativeSize::XLarge,
        DerivativeSize::XXLarge,
    ];

    pub fn width(&self) -> u32 {
        match self {
            DerivativeSize::Small => 250,
            DerivativeSize::Medium => 640,
            DerivativeSize::Large => 1200,
            DerivativeSize::XLarge => 1440,
            DerivativeSize::XXLarge => 1920,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DerivativeSize::Small => "s",
            DerivativeSize::Medium => "m",
            DerivativeSize::Large => "l",
            DerivativeSize::XLarge => "xl",
            DerivativeSize::XXLarge => "xxl",
        }
    }
}

impl fmt::Display for DerivativeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// An image file written by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub path: PathBuf,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
}

/// Rotation, resizing, thumbnail and derivative extraction
#[derive(Debug, Clone)]
pub struct ImageTransformEngine {
    output_dir: PathBuf,
    thumbnail_width: u32,
}

impl ImageTransformEngine {
    /// Engine writing thumbnails into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            thumbnail_width: THUMBNAIL_WIDTH,
        }
    }

    pub fn with_thumbnail_width(mut self, width: u32) -> Self {
        self.thumbnail_width = width.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Decode an image file without any orientation handling (first frame for GIFs).
    pub fn decode_file(&self, path: &Path) -> Result<DynamicImage, ImageTransformError> {
        let data = std::fs::read(path)?;
        decode(&data)
    }

    /// Decode and apply EXIF orientation.
    ///
    /// Sources above the size threshold are first downscaled to the maximum
    /// rotation width.
    pub fn rotate_image(&self, path: &Path) -> Result<DynamicImage, ImageTransformError> {
        let data = std::fs::read(path)?;
        let mut img = decode(&data)?;

        if data.len() as u64 > ROTATE_DOWNSCALE_THRESHOLD_BYTES && img.width() > ROTATE_MAX_WIDTH {
            tracing::debug!(
                path = %path.display(),
                size_bytes = data.len(),
                width = img.width(),
                "Downscaling large image before rotation"
            );
            img = ImageResize::resize_to_width(&img, ROTATE_MAX_WIDTH, 0);
        }

        Ok(ImageOrientation::apply_exif_orientation(img, &data))
    }

    /// Decode, fit-to-width resize and re-encode to `target_ext`.
    pub fn resize_image(
        &self,
        data: &[u8],
        target_ext: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ImageTransformError> {
        let img = decode(data)?;
        let resized = ImageResize::resize_to_width(&img, width, height);
        encode(&resized, format_for_extension(target_ext))
    }

    /// Shrink an image file in place to at most `width`, keeping its format.
    ///
    /// Returns the original and the resulting dimensions.
    pub fn resize_file(
        &self,
        path: &Path,
        ext: &str,
        width: u32,
    ) -> Result<((u32, u32), (u32, u32)), ImageTransformError> {
        let img = self.decode_file(path)?;
        let resized = bounded(&img, width);
        std::fs::write(path, encode(&resized, format_for_extension(ext))?)?;
        Ok((
            (img.width(), img.height()),
            (resized.width(), resized.height()),
        ))
    }

    /// Write a bounded-width thumbnail of `img` into the output directory.
    ///
    /// Only static and animated images are eligible. GIF sources keep the GIF
    /// format; everything else becomes JPEG. Returns `None` on any failure.
    pub fn extract_thumbnail(
        &self,
        img: &DynamicImage,
        category: MediaCategory,
        ext: &str,
        width: Option<u32>,
    ) -> Option<GeneratedImage> {
        if !category.is_thumbnail_eligible() {
            return None;
        }

        let format = if ext.eq_ignore_ascii_case("gif") {
            ImageFormat::Gif
        } else {
            ImageFormat::Jpeg
        };
        let thumb = bounded(img, width.unwrap_or(self.thumbnail_width));
        let filename = format!(
            "{}.{}",
            uuid::Uuid::new_v4().simple(),
            primary_extension(format)
        );
        let path = self.output_dir.join(&filename);

        match encode(&thumb, format).and_then(|bytes| Ok(std::fs::write(&path, bytes)?)) {
            Ok(()) => Some(GeneratedImage {
                path,
                filename,
                width: thumb.width(),
                height: thumb.height(),
                content_type: format.to_mime_type().to_string(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Thumbnail extraction failed");
                remove_partial(&path);
                None
            }
        }
    }

    /// Write `<base>_<suffix>.jpg` next to `source` at the bucket width.
    ///
    /// Returns `None` when the source is narrower than the bucket or on failure.
    pub fn extract_derivative_size(
        &self,
        source: &Path,
        bucket: DerivativeSize,
    ) -> Option<GeneratedImage> {
        match self.try_derivative(source, bucket) {
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!(
                    path = %source.display(),
                    bucket = %bucket,
                    error = %e,
                    "Derivative extraction failed"
                );
                None
            }
        }
    }

    fn try_derivative(
        &self,
        source: &Path,
        bucket: DerivativeSize,
    ) -> Result<Option<GeneratedImage>, ImageTransformError> {
        let data = std::fs::read(source)?;
        let img = ImageOrientation::apply_exif_orientation(decode(&data)?, &data);

        let target_width = bucket.width();
        if img.width() < target_width {
            return Ok(None);
        }

        let height = ImageResize::proportional_height(img.width(), img.height(), target_width);
        let resized = ImageResize::resize_image(&img, target_width, height);

        let base = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let filename = format!("{}_{}.jpg", base, bucket.suffix());
        let dir = source.parent().unwrap_or(&self.output_dir);
        let path = dir.join(&filename);
        std::fs::write(&path, encode(&resized, ImageFormat::Jpeg)?)?;

        Ok(Some(GeneratedImage {
            path,
            filename,
            width: resized.width(),
            height: resized.height(),
            content_type: ImageFormat::Jpeg.to_mime_type().to_string(),
        }))
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, ImageTransformError> {
    Ok(ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?)
}

/// Encode, dropping alpha for JPEG.
fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageTransformError> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, format)?,
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, format)?,
        _ => img.write_to(&mut buf, format)?,
    }
    Ok(buf.into_inner())
}

/// Shrink to `width` if wider; never upscale.
fn bounded(img: &DynamicImage, width: u32) -> DynamicImage {
    if img.width() <= width {
        img.clone()
    } else {
        ImageResize::resize_to_width(img, width, 0)
    }
}

/// Image format for a file extension, JPEG when unknown.
pub fn format_for_extension(ext: &str) -> ImageFormat {
    ImageFormat::from_extension(ext.trim_start_matches('.')).unwrap_or(ImageFormat::Jpeg)
}

fn primary_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("jpg")
}

/// Drop a half-written output file.
fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::orientation::tests::jpeg_with_orientation;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
    }

    fn write_image(dir: &Path, name: &str, img: &DynamicImage, format: ImageFormat) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, encode(img, format).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_rotate_image_applies_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.jpg");
        std::fs::write(&path, jpeg_with_orientation(&solid(40, 20), 6)).unwrap();

        let engine = ImageTransformEngine::new(dir.path());
        let rotated = engine.rotate_image(&path).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (20, 40));

        let untouched = engine.decode_file(&path).unwrap();
        assert_eq!((untouched.width(), untouched.height()), (40, 20));
    }

    #[test]
    fn test_rotate_image_without_exif_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), "a.png", &solid(30, 10), ImageFormat::Png);
        let rotated = ImageTransformEngine::new(dir.path()).rotate_image(&path).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (30, 10));
    }

    #[test]
    fn test_resize_image_reencodes() {
        let engine = ImageTransformEngine::new("/tmp");
        let png = encode(&solid(100, 50), ImageFormat::Png).unwrap();

        let out = engine.resize_image(&png, "jpg", 20, 0).unwrap();
        let decoded = decode(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_resize_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(dir.path(), "frame.png", &solid(1000, 500), ImageFormat::Png);

        let engine = ImageTransformEngine::new(dir.path());
        let (original, resized) = engine.resize_file(&path, "png", 500).unwrap();
        assert_eq!(original, (1000, 500));
        assert_eq!(resized, (500, 250));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(decode(&bytes).unwrap().width(), 500);
    }

    #[test]
    fn test_thumbnail_is_bounded_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ImageTransformEngine::new(dir.path());
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1000, 400, Rgba([0, 0, 255, 128])));

        let thumb = engine
            .extract_thumbnail(&img, MediaCategory::StaticImage, "png", None)
            .unwrap();

        assert_eq!((thumb.width, thumb.height), (500, 200));
        assert_eq!(thumb.content_type, "image/jpeg");
        assert!(thumb.filename.ends_with(".jpg"));
        assert!(thumb.path.exists());
    }

    #[test]
    fn test_thumbnail_keeps_gif_and_small_sources() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ImageTransformEngine::new(dir.path());

        let thumb = engine
            .extract_thumbnail(&solid(120, 60), MediaCategory::AnimatedImage, "gif", None)
            .unwrap();

        assert_eq!((thumb.width, thumb.height), (120, 60));
        assert_eq!(thumb.content_type, "image/gif");
        let bytes = std::fs::read(&thumb.path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Gif);
    }

    #[test]
    fn test_thumbnail_write_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let engine = ImageTransformEngine::new(&missing);
        assert!(engine
            .extract_thumbnail(&solid(600, 300), MediaCategory::StaticImage, "png", None)
            .is_none());
        assert!(!missing.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_partial_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        remove_partial(&path);
        std::fs::write(&path, b"partial").unwrap();
        remove_partial(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_thumbnail_rejects_ineligible_category() {
        let engine = ImageTransformEngine::new("/tmp");
        assert!(engine
            .extract_thumbnail(&solid(10, 10), MediaCategory::Video, "jpg", None)
            .is_none());
    }

    #[test]
    fn test_large_derivative_from_wide_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(dir.path(), "photo.jpg", &solid(2000, 1333), ImageFormat::Jpeg);

        let derivative = ImageTransformEngine::new(dir.path())
            .extract_derivative_size(&source, DerivativeSize::Large)
            .unwrap();

        assert_eq!(derivative.filename, "photo_l.jpg");
        assert_eq!(derivative.path, dir.path().join("photo_l.jpg"));
        assert_eq!(derivative.width, 1200);
        assert_eq!(derivative.height, 800);
        let written = decode(&std::fs::read(&derivative.path).unwrap()).unwrap();
        assert_eq!(written.width(), 1200);
    }

    #[test]
    fn test_derivative_skipped_for_narrow_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_image(dir.path(), "small.jpg", &solid(800, 600), ImageFormat::Jpeg);

        let engine = ImageTransformEngine::new(dir.path());
        assert!(engine.extract_derivative_size(&source, DerivativeSize::Large).is_none());
        assert!(!dir.path().join("small_l.jpg").exists());
    }

    #[test]
    fn test_png_derivative_is_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(300, 150, Rgba([9, 9, 9, 100])));
        let source = write_image(dir.path(), "logo.png", &img, ImageFormat::Png);

        let derivative = ImageTransformEngine::new(dir.path())
            .extract_derivative_size(&source, DerivativeSize::Small)
            .unwrap();

        assert_eq!(derivative.filename, "logo_s.jpg");
        assert_eq!((derivative.width, derivative.height), (250, 125));
        let bytes = std::fs::read(&derivative.path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_derivative_buckets() {
        let widths: Vec<u32> = DerivativeSize::ALL.iter().map(|b| b.width()).collect();
        assert_eq!(widths, vec![250, 640, 1200, 1440, 1920]);
        assert_eq!(DerivativeSize::XXLarge.to_string(), "xxl");
    }

    #[test]
    fn test_format_for_extension() {
        assert_eq!(format_for_extension("png"), ImageFormat::Png);
        assert_eq!(format_for_extension(".gif"), ImageFormat::Gif);
        assert_eq!(format_for_extension("unknown"), ImageFormat::Jpeg);
    }
}
