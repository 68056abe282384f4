use async_trait::async_trait;
use std::sync::Arc;

use mediaload_core::constants::{HEIF_TYPES, PNG_CONTENT_TYPE};
use mediaload_core::{AppError, MediaCategory};

use super::{blocking, MediaTransform, PipelineConfig, ProcessingJob, TransformOutcome};
use crate::image::ImageTransformEngine;
use crate::tool::{path_arg, require_output, ToolError, ToolInvoker};
use crate::video::{remove_stale, strings};

/// Decode (optionally EXIF-rotating), record dimensions and attach a thumbnail.
async fn measure_and_thumbnail(
    engine: &ImageTransformEngine,
    config: &PipelineConfig,
    job: &mut ProcessingJob,
    rotate: bool,
) -> Result<TransformOutcome, AppError> {
    let engine = engine.clone();
    let source = job.source.clone();
    let category = job.artifact.category;
    let ext = job.extension.clone();
    let want_thumbnail = !job.is_jpeg();

    let (dimensions, thumbnail) = blocking(move || {
        let img = if rotate {
            engine.rotate_image(&source)?
        } else {
            engine.decode_file(&source)?
        };
        let thumbnail = if want_thumbnail {
            engine.extract_thumbnail(&img, category, &ext, None)
        } else {
            None
        };
        Ok(((img.width(), img.height()), thumbnail))
    })
    .await?;

    job.artifact.width = Some(dimensions.0);
    job.artifact.height = Some(dimensions.1);

    match thumbnail {
        Some(generated) => job.attach_thumbnail(config, generated),
        None if want_thumbnail => {
            tracing::error!(guid = %job.artifact.guid, "Unable to extract thumbnail");
        }
        None => {}
    }
    Ok(TransformOutcome::Done)
}

/// JPEG/PNG and other directly decodable stills
pub struct StaticImageTransform {
    engine: ImageTransformEngine,
    config: Arc<PipelineConfig>,
}

impl StaticImageTransform {
    pub fn new(engine: ImageTransformEngine, config: Arc<PipelineConfig>) -> Self {
        Self { engine, config }
    }
}

#[async_trait]
impl MediaTransform for StaticImageTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        let rotate = !job.keep_original;
        measure_and_thumbnail(&self.engine, &self.config, job, rotate).await
    }
}

/// GIFs: first frame for dimensions, GIF thumbnail
pub struct AnimatedImageTransform {
    engine: ImageTransformEngine,
    config: Arc<PipelineConfig>,
}

impl AnimatedImageTransform {
    pub fn new(engine: ImageTransformEngine, config: Arc<PipelineConfig>) -> Self {
        Self { engine, config }
    }
}

#[async_trait]
impl MediaTransform for AnimatedImageTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        measure_and_thumbnail(&self.engine, &self.config, job, false).await
    }
}

/// Converts HEIC, WEBP, TIFF and friends to PNG, then hands over to the static transform.
pub struct OtherImageTransform {
    invoker: Arc<dyn ToolInvoker>,
    config: Arc<PipelineConfig>,
}

impl OtherImageTransform {
    pub fn new(invoker: Arc<dyn ToolInvoker>, config: Arc<PipelineConfig>) -> Self {
        Self { invoker, config }
    }

    fn is_heif(job: &ProcessingJob) -> bool {
        let by_type = job
            .artifact
            .content_type
            .as_deref()
            .is_some_and(|ct| HEIF_TYPES.contains(&ct));
        by_type || matches!(job.extension.as_str(), "heic" | "heif")
    }

    async fn convert(&self, job: &ProcessingJob) -> Result<std::path::PathBuf, ToolError> {
        let tools = &self.config.tools;
        let output = job.source.with_extension("png");
        remove_stale(&output).await;

        let (program, args) = if Self::is_heif(job) {
            (
                &tools.heif_convert_path,
                vec![path_arg(&job.source), path_arg(&output)],
            )
        } else {
            (
                &tools.ffmpeg_path,
                strings(&[
                    "-y",
                    "-loglevel",
                    "panic",
                    "-i",
                    &path_arg(&job.source),
                    &path_arg(&output),
                ]),
            )
        };

        tracing::info!(
            content_type = ?job.artifact.content_type,
            program = %program,
            "Converting image to PNG"
        );
        self.invoker.run(program, &args, tools.conversion_timeout).await?;
        require_output(program, &output).await?;
        Ok(output)
    }
}

#[async_trait]
impl MediaTransform for OtherImageTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        let png = match self.convert(job).await {
            Ok(png) => png,
            Err(e) => {
                job.artifact.category = MediaCategory::Unsupported;
                return Err(e.into());
            }
        };

        if png != job.source {
            if let Err(e) = tokio::fs::remove_file(&job.source).await {
                tracing::warn!(path = %job.source.display(), error = %e, "Failed to remove converted source");
            }
        }

        job.artifact.size_bytes = tokio::fs::metadata(&png).await?.len();
        job.artifact.content_type = Some(PNG_CONTENT_TYPE.to_string());
        job.artifact.local_path = png.clone();
        job.rename_extension(&self.config, "png");
        job.source = png;
        job.extension = "png".to_string();

        Ok(TransformOutcome::Reclassified(MediaCategory::StaticImage))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{encoded, pipeline, stage};
    use crate::image::orientation::tests::jpeg_with_orientation;
    use crate::tool::testing::FakeInvoker;
    use ::image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use mediaload_core::MediaCategory;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_png_gets_jpeg_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.png", "logo.png", &encoded(1000, 400, ImageFormat::Png)).await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/png"), "png", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::StaticImage);
        assert_eq!((artifact.width, artifact.height), (Some(1000), Some(400)));
        let thumb = artifact.thumbnail.unwrap();
        assert_eq!(thumb.guid, format!("{}thumbnail", artifact.guid));
        assert_eq!(thumb.content_type, "image/jpeg");
        assert_eq!((thumb.width, thumb.height), (Some(500), Some(200)));
        assert_eq!(thumb.url, format!("http://cdn.test/media/{}", thumb.filename));
        assert!(thumb.local_path.exists());
    }

    #[tokio::test]
    async fn test_jpeg_is_rotated_without_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 20, Rgb([1, 2, 3])));
        let staged = stage(dir.path(), "abc.jpg", "phone.jpg", &jpeg_with_orientation(&img, 6)).await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/jpeg"), "jpg", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!((artifact.width, artifact.height), (Some(20), Some(60)));
        assert!(artifact.thumbnail.is_none());
    }

    #[tokio::test]
    async fn test_keep_original_skips_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 20, Rgb([1, 2, 3])));
        let staged = stage(dir.path(), "abc.jpg", "phone.jpg", &jpeg_with_orientation(&img, 6)).await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/jpeg"), "jpg", true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!((artifact.width, artifact.height), (Some(60), Some(20)));
    }

    #[tokio::test]
    async fn test_gif_keeps_gif_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.gif", "anim.gif", &encoded(80, 40, ImageFormat::Gif)).await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::default()))
            .process(staged, Some("image/gif"), "gif", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::AnimatedImage);
        assert_eq!((artifact.width, artifact.height), (Some(80), Some(40)));
        let thumb = artifact.thumbnail.unwrap();
        assert_eq!(thumb.content_type, "image/gif");
        assert!(thumb.filename.ends_with(".gif"));
    }

    /// Stands in for ffmpeg/heif-convert by writing a real PNG to the last argument.
    struct PngConverter(FakeInvoker);

    #[async_trait::async_trait]
    impl crate::tool::ToolInvoker for PngConverter {
        async fn run(
            &self,
            executable: &str,
            args: &[String],
            timeout: std::time::Duration,
        ) -> Result<String, crate::tool::ToolError> {
            self.0.run(executable, args, timeout).await?;
            if let Some(last) = args.last() {
                tokio::fs::write(last, encoded(700, 350, ImageFormat::Png)).await.unwrap();
            }
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_heic_converted_then_processed_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.heic", "photo.heic", b"heic bytes").await;
        let source = staged.path.clone();
        let invoker = Arc::new(PngConverter(FakeInvoker::default()));

        let artifact = super::super::MediaPipeline::new(
            super::super::PipelineConfig::new(
                dir.path(),
                "http://cdn.test/media",
                mediaload_core::ToolConfig::default(),
            ),
            invoker.clone(),
        )
        .process(staged, Some("image/heic"), "heic", false)
        .await
        .unwrap()
        .unwrap();

        let calls = invoker.0.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "heif-convert");
        assert_eq!(calls[0].2, std::time::Duration::from_secs(60));

        assert_eq!(artifact.category, MediaCategory::StaticImage);
        assert_eq!(artifact.content_type.as_deref(), Some("image/png"));
        assert_eq!(artifact.filename, "abc.png");
        assert_eq!(artifact.url, "http://cdn.test/media/abc.png");
        assert_eq!((artifact.width, artifact.height), (Some(700), Some(350)));
        assert!(artifact.thumbnail.is_some());
        assert!(!source.exists());
        assert!(dir.path().join("abc.png").exists());
    }

    #[tokio::test]
    async fn test_webp_uses_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.webp", "photo.webp", b"webp bytes").await;
        let invoker = Arc::new(PngConverter(FakeInvoker::default()));

        super::super::MediaPipeline::new(
            super::super::PipelineConfig::new(
                dir.path(),
                "http://cdn.test/media",
                mediaload_core::ToolConfig::default(),
            ),
            invoker.clone(),
        )
        .process(staged, Some("image/webp"), "webp", false)
        .await
        .unwrap();

        let (program, args, _) = &invoker.0.calls()[0];
        assert_eq!(program, "ffmpeg");
        assert_eq!(&args[..3], &["-y", "-loglevel", "panic"]);
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.tiff", "scan.tiff", b"tiff bytes").await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::failing()))
            .process(staged, Some("image/tiff"), "tiff", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::Unsupported);
        assert_eq!(artifact.filename, "abc.tiff");
        assert!(artifact.width.is_none());
        assert!(dir.path().join("abc.tiff").exists());
    }
}
