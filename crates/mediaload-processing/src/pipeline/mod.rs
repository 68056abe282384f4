//! Media processing pipeline
//!
//! A finished artifact is classified once and handed to the [`MediaTransform`]
//! registered for its category. A transform may reclassify the job (other
//! image formats become PNG and continue as static images). Tool failures and
//! unsupported media degrade the result; only I/O and validation errors abort.

mod audio;
mod images;
mod video;

pub use self::audio::AudioTransform;
pub use self::images::{AnimatedImageTransform, OtherImageTransform, StaticImageTransform};
pub use self::video::VideoTransform;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediaload_core::constants::{JPEG_CONTENT_TYPE, THUMBNAIL_GUID_SUFFIX, THUMBNAIL_WIDTH};
use mediaload_core::{AppError, MediaArtifact, MediaCategory, ThumbnailArtifact, ToolConfig};

use crate::classifier::MediaClassifier;
use crate::image::{GeneratedImage, ImageTransformEngine};
use crate::tool::ToolInvoker;

/// Reclassification hops allowed per job.
const MAX_TRANSFORM_HOPS: usize = 3;

/// Where processed files live and how they are addressed
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub base_url: String,
    pub tools: ToolConfig,
    pub thumbnail_width: u32,
}

impl PipelineConfig {
    pub fn new(output_dir: impl Into<PathBuf>, base_url: impl Into<String>, tools: ToolConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_url: base_url.into(),
            tools,
            thumbnail_width: THUMBNAIL_WIDTH,
        }
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), filename)
    }
}

/// A durable file ready for processing
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub filename: String,
    pub url: String,
    pub original_filename: String,
}

/// Mutable state threaded through the transforms
#[derive(Debug)]
pub struct ProcessingJob {
    pub artifact: MediaArtifact,
    /// Current working file; replaced when a transform converts the source.
    pub source: PathBuf,
    pub extension: String,
    pub keep_original: bool,
}

impl ProcessingJob {
    /// Stored filename stem, shared by every file derived from this artifact.
    pub fn stem(&self) -> String {
        Path::new(&self.artifact.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.artifact.guid)
            .to_string()
    }

    /// Point the logical filename and url at `<stem>.<ext>`.
    pub fn rename_extension(&mut self, config: &PipelineConfig, ext: &str) {
        let filename = format!("{}.{}", self.stem(), ext);
        self.artifact.url = config.url_for(&filename);
        self.artifact.filename = filename;
    }

    /// JPEG artifacts never carry a separate thumbnail.
    pub fn is_jpeg(&self) -> bool {
        matches!(
            self.artifact.content_type.as_deref(),
            Some(JPEG_CONTENT_TYPE) | Some("image/jpg")
        )
    }

    pub fn attach_thumbnail(&mut self, config: &PipelineConfig, generated: GeneratedImage) {
        self.artifact.thumbnail = Some(ThumbnailArtifact {
            guid: format!("{}{}", self.artifact.guid, THUMBNAIL_GUID_SUFFIX),
            url: config.url_for(&generated.filename),
            filename: generated.filename,
            content_type: generated.content_type,
            width: Some(generated.width),
            height: Some(generated.height),
            local_path: generated.path,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    Done,
    /// Run the transform registered for this category next.
    Reclassified(MediaCategory),
}

/// Category-specific processing step
#[async_trait]
pub trait MediaTransform: Send + Sync {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError>;
}

/// Leaves the artifact with identity, content type and size only.
pub struct UnsupportedTransform;

#[async_trait]
impl MediaTransform for UnsupportedTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        tracing::debug!(
            guid = %job.artifact.guid,
            content_type = ?job.artifact.content_type,
            "No transform for unsupported media"
        );
        Ok(TransformOutcome::Done)
    }
}

pub struct MediaPipeline {
    config: Arc<PipelineConfig>,
    classifier: MediaClassifier,
    transforms: HashMap<MediaCategory, Arc<dyn MediaTransform>>,
}

impl MediaPipeline {
    /// Pipeline with the default transform for every category.
    pub fn new(config: PipelineConfig, invoker: Arc<dyn ToolInvoker>) -> Self {
        let config = Arc::new(config);
        let engine = ImageTransformEngine::new(config.output_dir.clone())
            .with_thumbnail_width(config.thumbnail_width);

        let mut transforms: HashMap<MediaCategory, Arc<dyn MediaTransform>> = HashMap::new();
        transforms.insert(
            MediaCategory::StaticImage,
            Arc::new(StaticImageTransform::new(engine.clone(), config.clone())),
        );
        transforms.insert(
            MediaCategory::AnimatedImage,
            Arc::new(AnimatedImageTransform::new(engine.clone(), config.clone())),
        );
        transforms.insert(
            MediaCategory::OtherImage,
            Arc::new(OtherImageTransform::new(invoker.clone(), config.clone())),
        );
        transforms.insert(
            MediaCategory::Video,
            Arc::new(VideoTransform::new(invoker.clone(), engine, config.clone())),
        );
        transforms.insert(
            MediaCategory::Audio,
            Arc::new(AudioTransform::new(invoker, config.clone())),
        );
        transforms.insert(MediaCategory::Unsupported, Arc::new(UnsupportedTransform));

        Self {
            config,
            classifier: MediaClassifier::default(),
            transforms,
        }
    }

    pub fn with_classifier(mut self, classifier: MediaClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the transform for one category.
    pub fn with_transform(mut self, category: MediaCategory, transform: Arc<dyn MediaTransform>) -> Self {
        self.transforms.insert(category, transform);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify and transform a finished artifact.
    ///
    /// Returns `Ok(None)` for zero-byte input.
    #[tracing::instrument(
        skip(self, staged),
        fields(filename = %staged.filename, original = %staged.original_filename)
    )]
    pub async fn process(
        &self,
        staged: StagedArtifact,
        declared_content_type: Option<&str>,
        original_extension: &str,
        keep_original: bool,
    ) -> Result<Option<MediaArtifact>, AppError> {
        let size_bytes = tokio::fs::metadata(&staged.path).await?.len();
        if size_bytes == 0 {
            tracing::warn!(path = %staged.path.display(), "Rejecting zero-byte artifact");
            return Ok(None);
        }

        let classification = self
            .classifier
            .resolve(
                declared_content_type,
                &staged.original_filename,
                original_extension,
                &staged.path,
            )
            .await;

        let mut artifact = MediaArtifact::new(
            uuid::Uuid::new_v4().to_string(),
            staged.original_filename,
            staged.filename,
            staged.url,
            staged.path.clone(),
        );
        artifact.content_type = classification.content_type;
        artifact.category = classification.category;
        artifact.size_bytes = size_bytes;

        let mut job = ProcessingJob {
            artifact,
            source: staged.path,
            extension: classification.extension,
            keep_original,
        };

        tracing::info!(
            guid = %job.artifact.guid,
            category = %job.artifact.category,
            content_type = ?job.artifact.content_type,
            size_bytes,
            "Processing artifact"
        );

        for _ in 0..MAX_TRANSFORM_HOPS {
            let category = job.artifact.category;
            let Some(transform) = self.transforms.get(&category) else {
                tracing::debug!(category = %category, "No transform registered");
                break;
            };

            match transform.apply(&mut job).await {
                Ok(TransformOutcome::Done) => break,
                Ok(TransformOutcome::Reclassified(next)) => {
                    tracing::debug!(from = %category, to = %next, "Artifact reclassified");
                    job.artifact.category = next;
                }
                Err(e) if e.is_request_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        guid = %job.artifact.guid,
                        category = %category,
                        error = %e,
                        error_type = e.error_type(),
                        "Processing step degraded"
                    );
                    break;
                }
            }
        }

        Ok(Some(job.artifact))
    }
}

/// Run CPU-bound image work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, crate::image::ImageTransformError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::UnsupportedMedia(format!("Image task failed: {}", e)))?
        .map_err(AppError::from)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tool::testing::FakeInvoker;
    use ::image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    pub(crate) fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 200])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    pub(crate) fn pipeline(dir: &Path, invoker: Arc<FakeInvoker>) -> MediaPipeline {
        MediaPipeline::new(
            PipelineConfig::new(dir, "http://cdn.test/media", ToolConfig::default()),
            invoker,
        )
    }

    pub(crate) async fn stage(dir: &Path, name: &str, original: &str, data: &[u8]) -> StagedArtifact {
        let path = dir.join(name);
        tokio::fs::write(&path, data).await.unwrap();
        StagedArtifact {
            path,
            filename: name.to_string(),
            url: format!("http://cdn.test/media/{}", name),
            original_filename: original.to_string(),
        }
    }

    #[tokio::test]
    async fn test_zero_byte_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(FakeInvoker::writing_output());
        let staged = stage(dir.path(), "empty.png", "empty.png", b"").await;

        let result = pipeline(dir.path(), invoker.clone())
            .process(staged, Some("image/png"), "png", false)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedArtifact {
            path: dir.path().join("gone.png"),
            filename: "gone.png".to_string(),
            url: "u".to_string(),
            original_filename: "gone.png".to_string(),
        };

        let err = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/png"), "png", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_unsupported_keeps_identity_only() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(FakeInvoker::writing_output());
        let staged = stage(dir.path(), "abc.unknownext", "notes.unknownext", b"\x00\x01\x02").await;

        let artifact = pipeline(dir.path(), invoker.clone())
            .process(staged, None, "unknownext", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::Unsupported);
        assert_eq!(artifact.filename, "abc.unknownext");
        assert_eq!(artifact.original_filename, "notes.unknownext");
        assert_eq!(artifact.size_bytes, 3);
        assert!(artifact.width.is_none());
        assert!(artifact.thumbnail.is_none());
        assert!(!artifact.processing);
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_image_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "broken.png", "broken.png", b"definitely not a png").await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/png"), "png", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::StaticImage);
        assert!(artifact.width.is_none());
        assert!(artifact.thumbnail.is_none());
    }

    struct Marker;

    #[async_trait]
    impl MediaTransform for Marker {
        async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
            job.artifact.duration_text = Some("custom".to_string());
            Ok(TransformOutcome::Done)
        }
    }

    #[tokio::test]
    async fn test_transform_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "a.bin", "a.bin", b"bytes").await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .with_transform(MediaCategory::Unsupported, Arc::new(Marker))
            .process(staged, None, "", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.duration_text.as_deref(), Some("custom"));
    }

    struct Failing;

    #[async_trait]
    impl MediaTransform for Failing {
        async fn apply(&self, _job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
            Err(AppError::Io("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_io_failure_in_transform_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "a.bin", "a.bin", b"bytes").await;

        let err = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .with_transform(MediaCategory::Unsupported, Arc::new(Failing))
            .process(staged, None, "", false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_url_for_trims_slash() {
        let config = PipelineConfig::new("/tmp", "http://cdn.test/media/", ToolConfig::default());
        assert_eq!(config.url_for("a.png"), "http://cdn.test/media/a.png");
    }
}
