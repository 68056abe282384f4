use async_trait::async_trait;
use std::sync::Arc;

use mediaload_core::constants::{CANONICAL_AUDIO_CONTENT_TYPE, CANONICAL_AUDIO_EXT};
use mediaload_core::AppError;

use super::{MediaTransform, PipelineConfig, ProcessingJob, TransformOutcome};
use crate::audio::AudioTransformer;
use crate::tool::ToolInvoker;

/// Rewrites the artifact to the canonical MP3 rendition.
pub struct AudioTransform {
    audio: AudioTransformer,
    config: Arc<PipelineConfig>,
}

impl AudioTransform {
    pub fn new(invoker: Arc<dyn ToolInvoker>, config: Arc<PipelineConfig>) -> Self {
        Self {
            audio: AudioTransformer::new(invoker, config.tools.clone()),
            config,
        }
    }
}

#[async_trait]
impl MediaTransform for AudioTransform {
    async fn apply(&self, job: &mut ProcessingJob) -> Result<TransformOutcome, AppError> {
        // MP3 sources are already canonical
        job.artifact.processing = !job.extension.eq_ignore_ascii_case(CANONICAL_AUDIO_EXT);
        job.artifact.content_type = Some(CANONICAL_AUDIO_CONTENT_TYPE.to_string());
        job.rename_extension(&self.config, CANONICAL_AUDIO_EXT);

        match self.audio.detect_duration(&job.source).await {
            Ok(duration) => {
                job.artifact.duration = duration.seconds;
                job.artifact.duration_text = Some(duration.text);
            }
            Err(e) => tracing::debug!(error = %e, "Audio duration unavailable"),
        }

        Ok(TransformOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{pipeline, stage};
    use crate::tool::testing::FakeInvoker;
    use mediaload_core::MediaCategory;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wav_pending_transcode_to_mp3() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.wav", "take.wav", b"RIFF").await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::with_stdout("duration=0:00:12.000000")))
            .process(staged, Some("audio/x-wav"), "wav", false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(artifact.category, MediaCategory::Audio);
        assert!(artifact.processing);
        assert_eq!(artifact.content_type.as_deref(), Some("audio/mp3"));
        assert_eq!(artifact.filename, "abc.mp3");
        assert_eq!(artifact.url, "http://cdn.test/media/abc.mp3");
        assert_eq!(artifact.duration, Some(12.0));
    }

    #[tokio::test]
    async fn test_mp3_needs_no_transcode() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(dir.path(), "abc.mp3", "song.mp3", b"ID3").await;

        let artifact = pipeline(dir.path(), Arc::new(FakeInvoker::failing()))
            .process(staged, Some("audio/mpeg"), "mp3", false)
            .await
            .unwrap()
            .unwrap();

        assert!(!artifact.processing);
        assert_eq!(artifact.filename, "abc.mp3");
        assert!(artifact.duration.is_none());
    }
}
