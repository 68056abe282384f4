use std::path::Path;
use std::time::Duration;

use crate::tool::{path_arg, ToolError, ToolInvoker};

/// Media duration as reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDuration {
    /// Sexagesimal text, e.g. `0:00:59.400000`
    pub text: String,
    pub seconds: Option<f64>,
}

/// Probe the container duration with ffprobe.
///
/// ffprobe prints `duration=0:00:59.400000`; the text after `=` is kept.
pub async fn probe_duration(
    invoker: &dyn ToolInvoker,
    ffprobe_path: &str,
    media: &Path,
    timeout: Duration,
) -> Result<MediaDuration, ToolError> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1".to_string(),
        path_arg(media),
        "-sexagesimal".to_string(),
    ];
    let output = invoker.run(ffprobe_path, &args, timeout).await?;
    let text = output
        .split_once('=')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ToolError::MissingOutput {
            program: ffprobe_path.to_string(),
            path: path_arg(media),
        });
    }

    tracing::debug!(media = %media.display(), duration = %text, "Duration probed");
    Ok(MediaDuration {
        seconds: parse_duration(&text),
        text,
    })
}

/// Parse `H:M:S.f` (or `M:S`, or plain seconds) into seconds.
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut seconds = 0.0;
    for part in text.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::FakeInvoker;
    use std::path::PathBuf;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0:00:59.400000"), Some(59.4));
        assert_eq!(parse_duration("1:02:03.5"), Some(3723.5));
        assert_eq!(parse_duration("42.0"), Some(42.0));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn test_probe_duration_parses_output() {
        let invoker = FakeInvoker::with_stdout("duration=0:01:30.250000\n");
        let duration = probe_duration(&invoker, "ffprobe", &PathBuf::from("/tmp/a.mp4"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(duration.text, "0:01:30.250000");
        assert_eq!(duration.seconds, Some(90.25));
        let calls = invoker.calls();
        assert_eq!(calls[0].0, "ffprobe");
        assert!(calls[0].1.contains(&"format=duration".to_string()));
        assert_eq!(calls[0].1.last().unwrap(), "-sexagesimal");
    }

    #[tokio::test]
    async fn test_probe_duration_without_value_fails() {
        let invoker = FakeInvoker::with_stdout("");
        let result = probe_duration(&invoker, "ffprobe", &PathBuf::from("/tmp/a.mp4"), Duration::from_secs(60)).await;
        assert!(result.is_err());
    }
}
