use async_trait::async_trait;
use std::sync::Arc;

use mediaload_core::constants::CANONICAL_VIDEO_EXT;
use mediaload_core::AppError;

use super::{blocking, MediaTransform, PipelineConfig, ProcessingJob, TransformOutcome};
use crate::image::engine::format_for_extension;
use crate::image::{GeneratedImage, ImageTransformEngine};
use crate::tool::ToolInvoker;
use crate::video::{remove_stale, VideoTransformer};

/// Marks the artifact for transcoding and grabs a poster frame.
pub struct VideoTransform {
    video: VideoTransformer,
    engine: ImageTransformEngine,
    config: Arc<PipelineConfig>,
}

impl VideoTransform {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        engine: ImageTransformEngine,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            video: VideoTransformer::new(invoker, config.tools.clone()),
            engine,
            config,
        }
    }

    /// Extract, shrink and decorate a frame. Returns the thumbnail and the frame's native size.
    async fn poster_frame(
        &self,
        job: &ProcessingJob,
    ) -> Result<(GeneratedImage, (u32, u32)), AppError> {
        let tools = &self.config.tools;
        let ext = tools.thumb_ext.clone();
        let filename = format!("{}_extract.{}", job.stem(), ext);
        let frame = self.config.output_dir.join(&filename);

        self.video
            .extract_frame(&job.source, &frame, &tools.thumb_start_time)
            .await?;

        let engine = self.engine.clone();
        let frame_path = frame.clone();
        let resize_ext = ext.clone();
        let width = self.config.thumbnail_width;
        let resized = blocking(move || engine.resize_file(&frame_path, &resize_ext, width)).await;
        let (native, (width, height)) = match resized {
            Ok(dims) => dims,
            Err(e) => {
                remove_stale(&frame).await;
                return Err(e);
            }
        };

        if let Some(icon) = &tools.play_icon_path {
            if let Err(e) = self
                .video
                .overlay_play_icon(&self.config.output_dir, &frame, icon, &ext, Some(width), Some(height))
                .await
            {
                tracing::warn!(error = %e, "Failed to overlay play icon");
            }
        }

        Ok((
            GeneratedImage {
                path: frame,
                filename,
                width,
                height,
                content_type: format_for_extension(&ext).to_mime_type().to_string(),
            },
            native,
        ))
    }
}

#[async_trait]
impl MediaTransform for VideoTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        job.artifact.processing = true;
        job.rename_extension(&self.config, CANONICAL_VIDEO_EXT);

        match self.poster_frame(job).await {
            Ok((thumbnail, (width, height))) => {
                job.artifact.width = Some(width);
                job.artifact.height = Some(height);
                if !job.is_jpeg() {
                    job.attach_thumbnail(&self.config, thumbnail);
                }
            }
            Err(e) => {
                tracing::error!(
                    guid = %job.artifact.guid,
                    error = %e,
                    "Can not extract video thumbnail"
                );
            }
        }

        match self.video.detect_duration(&job.source).await {
            Ok(duration) => {
                job.artifact.duration = duration.seconds;
                job.artifact.duration_text = Some(duration.text);
            }
            Err(e) => tracing::debug!(error = %e, "Video duration unavailable"),
        }

        Ok(TransformOutcome::Done)
    }
}
