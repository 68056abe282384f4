//! Audio transforms over ffmpeg/ffprobe

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediaload_core::ToolConfig;

use crate::duration::{probe_duration, MediaDuration};
use crate::tool::{path_arg, require_output, ToolError, ToolInvoker};
use crate::video::{remove_stale, strings};

#[derive(Clone)]
pub struct AudioTransformer {
    invoker: Arc<dyn ToolInvoker>,
    tools: ToolConfig,
}

impl AudioTransformer {
    pub fn new(invoker: Arc<dyn ToolInvoker>, tools: ToolConfig) -> Self {
        Self { invoker, tools }
    }

    /// Transcode to 128k MP3.
    #[tracing::instrument(skip(self), fields(service = "audio"))]
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<PathBuf, ToolError> {
        remove_stale(output).await;
        let args = strings(&[
            "-y",
            "-loglevel",
            "panic",
            "-i",
            &path_arg(input),
            "-codec:a",
            "libmp3lame",
            "-b:a",
            "128k",
            &path_arg(output),
        ]);
        self.invoker
            .run(&self.tools.ffmpeg_path, &args, self.tools.transcode_timeout)
            .await?;
        require_output(&self.tools.ffmpeg_path, output).await?;
        Ok(output.to_path_buf())
    }

    #[tracing::instrument(skip(self), fields(service = "audio"))]
    pub async fn detect_duration(&self, input: &Path) -> Result<MediaDuration, ToolError> {
        probe_duration(
            self.invoker.as_ref(),
            &self.tools.ffprobe_path,
            input,
            self.tools.transcode_timeout,
        )
        .await
    }
}
