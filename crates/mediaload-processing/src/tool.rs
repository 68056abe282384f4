//! External tool invocation
//!
//! Every transcoder, probe and converter goes through [`ToolInvoker::run`]. The
//! call never panics and never leaves a child process behind: children are
//! spawned with `kill_on_drop`, and on timeout or I/O failure they are killed
//! and reaped before the error is returned.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

const STDERR_LOG_LIMIT: usize = 500;

/// Characters rejected in executable paths and arguments. Arguments go to the
/// child as an argv, so only characters that split or truncate a value matter.
const FORBIDDEN_CHARS: &[char] = &['\0', '\n', '\r'];

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid tool argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("IO error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} produced no output at {path}")]
    MissingOutput { program: String, path: String },
}

impl From<ToolError> for mediaload_core::AppError {
    fn from(err: ToolError) -> Self {
        mediaload_core::AppError::ToolFailure(err.to_string())
    }
}

/// Runs an external executable under a wall-clock timeout.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run `executable` with `args`, returning captured stdout on a zero exit.
    async fn run(
        &self,
        executable: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String, ToolError>;
}

/// [`ToolInvoker`] backed by `tokio::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInvoker;

impl CommandInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolInvoker for CommandInvoker {
    #[tracing::instrument(skip(self, args), fields(program = %executable, timeout_ms = timeout.as_millis() as u64))]
    async fn run(
        &self,
        executable: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String, ToolError> {
        validate_arg(executable)?;
        for arg in args {
            validate_arg(arg)?;
        }

        tracing::info!(command = %format!("{} {}", executable, args.join(" ")), "Executing external tool");
        let start = Instant::now();

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: executable.to_string(),
                source,
            })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let outcome = tokio::time::timeout(timeout, async {
            let (out, err, status) = tokio::join!(
                read_pipe(stdout.as_mut()),
                read_pipe(stderr.as_mut()),
                child.wait()
            );
            Ok::<_, std::io::Error>((out?, err?, status?))
        })
        .await;

        let (out, err, status) = match outcome {
            Ok(Ok(captured)) => captured,
            Ok(Err(source)) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill process after I/O error");
                }
                return Err(ToolError::Io {
                    program: executable.to_string(),
                    source,
                });
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::error!(error = %e, "Failed to kill timed out process");
                }
                tracing::warn!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "External tool timed out"
                );
                return Err(ToolError::Timeout {
                    program: executable.to_string(),
                    timeout,
                });
            }
        };

        if !status.success() {
            let stderr: String = String::from_utf8_lossy(&err)
                .chars()
                .take(STDERR_LOG_LIMIT)
                .collect();
            tracing::warn!(code = ?status.code(), stderr = %stderr, "External tool failed");
            return Err(ToolError::NonZeroExit {
                program: executable.to_string(),
                code: status.code(),
                stderr,
            });
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            stdout_bytes = out.len(),
            "External tool finished"
        );

        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<&mut R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Reject NUL and line breaks.
pub fn validate_arg(arg: &str) -> Result<(), ToolError> {
    if arg.contains(FORBIDDEN_CHARS) {
        return Err(ToolError::InvalidArgument(format!(
            "'{}' contains a forbidden character",
            arg
        )));
    }
    Ok(())
}

/// Path as an owned argument string
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// True when `path` exists and is non-empty.
pub async fn has_output(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Fail with [`ToolError::MissingOutput`] unless `path` exists and is non-empty.
pub async fn require_output(program: &str, path: &Path) -> Result<(), ToolError> {
    if has_output(path).await {
        Ok(())
    } else {
        Err(ToolError::MissingOutput {
            program: program.to_string(),
            path: path.display().to_string(),
        })
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = CommandInvoker
            .run("echo", &args(&["hello"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let err = CommandInvoker
            .run("false", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = CommandInvoker
            .run("sleep", &args(&["5"]), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let err = CommandInvoker
            .run("/nonexistent/mediaload-tool", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_rejects_line_breaks_and_nul() {
        for bad in ["a\nb", "a\rb", "a\0b"] {
            let err = CommandInvoker
                .run("echo", &args(&[bad]), Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_shell_characters_pass_through_verbatim() {
        let value = "/opt/Program Files (x86)/$tools; a|b & <c>";
        let out = CommandInvoker
            .run("echo", &args(&[value]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim_end(), value);
        assert!(validate_arg("C:\\Program Files (x86)\\ffmpeg\\bin\\ffmpeg.exe").is_ok());
    }

    #[tokio::test]
    async fn test_require_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        assert!(require_output("ffmpeg", &path).await.is_err());
        tokio::fs::write(&path, b"").await.unwrap();
        assert!(require_output("ffmpeg", &path).await.is_err());
        tokio::fs::write(&path, b"data").await.unwrap();
        assert!(require_output("ffmpeg", &path).await.is_ok());
    }
}
