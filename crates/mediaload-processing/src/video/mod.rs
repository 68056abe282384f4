//! Video transforms over ffmpeg/ffprobe
//!
//! Thin wrappers with fixed argument templates. Each transform deletes any
//! stale output first and only succeeds when the tool produced a non-empty file.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use mediaload_core::ToolConfig;

use crate::duration::{probe_duration, MediaDuration};
use crate::tool::{path_arg, require_output, ToolError, ToolInvoker};

/// Side length of the play icon overlaid on video thumbnails.
const PLAY_ICON_SIZE: u32 = 60;
const DEFAULT_OVERLAY: &str = "overlay=90:70";

static ROTATE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"rotate=(\S+)").ok());

#[derive(Clone)]
pub struct VideoTransformer {
    invoker: Arc<dyn ToolInvoker>,
    tools: ToolConfig,
}

impl VideoTransformer {
    pub fn new(invoker: Arc<dyn ToolInvoker>, tools: ToolConfig) -> Self {
        Self { invoker, tools }
    }

    /// Transcode to the canonical MP4 rendition.
    #[tracing::instrument(skip(self), fields(service = "video"))]
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<PathBuf, ToolError> {
        remove_stale(output).await;
        let args = strings(&[
            "-y",
            "-loglevel",
            "panic",
            "-i",
            &path_arg(input),
            "-preset",
            "superfast",
            "-movflags",
            "+faststart",
            "-tune",
            "fastdecode",
            "-crf",
            "25",
            "-bufsize",
            "2M",
            "-c:a",
            "aac",
            &path_arg(output),
        ]);
        self.invoker
            .run(&self.tools.ffmpeg_path, &args, self.tools.transcode_timeout)
            .await?;
        require_output(&self.tools.ffmpeg_path, output).await?;
        Ok(output.to_path_buf())
    }

    /// Grab a single frame at `start_time` into `output`.
    #[tracing::instrument(skip(self), fields(service = "video"))]
    pub async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        start_time: &str,
    ) -> Result<PathBuf, ToolError> {
        remove_stale(output).await;
        let args = strings(&[
            "-y",
            "-loglevel",
            "panic",
            "-i",
            &path_arg(input),
            "-ss",
            start_time,
            "-vframes",
            "1",
            &path_arg(output),
        ]);
        self.invoker
            .run(&self.tools.ffmpeg_path, &args, self.tools.transcode_timeout)
            .await?;
        require_output(&self.tools.ffmpeg_path, output).await?;
        Ok(output.to_path_buf())
    }

    /// Overlay the play icon centred on `thumbnail`, rewriting it in place.
    ///
    /// Without known dimensions the icon lands at a fixed offset.
    #[tracing::instrument(skip(self), fields(service = "video"))]
    pub async fn overlay_play_icon(
        &self,
        work_dir: &Path,
        thumbnail: &Path,
        icon: &Path,
        ext: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<PathBuf, ToolError> {
        let temp = work_dir.join(format!("{}.{}", uuid::Uuid::new_v4().simple(), ext));
        remove_stale(&temp).await;

        let overlay = match (width, height) {
            (Some(w), Some(h)) => format!(
                "overlay={}:{}",
                (f64::from(w) - f64::from(PLAY_ICON_SIZE)) / 2.0,
                (f64::from(h) - f64::from(PLAY_ICON_SIZE)) / 2.0
            ),
            _ => DEFAULT_OVERLAY.to_string(),
        };

        let args = strings(&[
            "-y",
            "-loglevel",
            "panic",
            "-i",
            &path_arg(thumbnail),
            "-i",
            &path_arg(icon),
            "-filter_complex",
            &overlay,
            "-preset",
            "superfast",
            &path_arg(&temp),
        ]);
        let result = async {
            self.invoker
                .run(&self.tools.ffmpeg_path, &args, self.tools.transcode_timeout)
                .await?;
            require_output(&self.tools.ffmpeg_path, &temp).await?;
            tokio::fs::copy(&temp, thumbnail)
                .await
                .map_err(|source| ToolError::Io {
                    program: self.tools.ffmpeg_path.clone(),
                    source,
                })?;
            Ok::<_, ToolError>(thumbnail.to_path_buf())
        }
        .await;
        remove_stale(&temp).await;
        result
    }

    /// Rotation tag of the first video stream, if any.
    #[tracing::instrument(skip(self), fields(service = "video"))]
    pub async fn detect_rotation(&self, input: &Path) -> Result<Option<i32>, ToolError> {
        let args = strings(&[
            "-v",
            "error",
            "-show_entries",
            "stream_tags=rotate",
            "-of",
            "default=noprint_wrappers=1",
            &path_arg(input),
        ]);
        let output = self
            .invoker
            .run(&self.tools.ffprobe_path, &args, self.tools.transcode_timeout)
            .await?;
        Ok(parse_rotation(&output))
    }

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

/// Parse `TAG:rotate=90` style probe output.
pub fn parse_rotation(output: &str) -> Option<i32> {
    ROTATE_PATTERN
        .as_ref()?
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().parse().ok())
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub(crate) async fn remove_stale(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale output");
        }
    }
}
