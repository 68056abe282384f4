//! Configuration module
//!
//! Configuration is read once from the environment (with `.env` support) and
//! handed to components as plain values at construction time.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const SERVER_PORT: u16 = 3000;
const MAX_FILE_SIZE_MB: u64 = 500;
const TRANSCODE_TIMEOUT_SECS: u64 = 600;
const CONVERSION_TIMEOUT_SECS: u64 = 60;

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Filesystem layout for parts and finished artifacts
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root directory for finished artifacts; session directories live below it.
    pub upload_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Base URL prepended to stored filenames.
    pub public_base_url: String,
    /// Advisory only; enforced by the HTTP body limit.
    pub max_file_size_bytes: u64,
}

/// External executables and their invocation settings
#[derive(Clone, Debug)]
pub struct ToolConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub heif_convert_path: String,
    pub thumb_ext: String,
    pub thumb_start_time: String,
    pub play_icon_path: Option<PathBuf>,
    pub transcode_timeout: Duration,
    pub conversion_timeout: Duration,
}

impl ToolConfig {
    /// Build a tool config for the given ffmpeg binary, deriving ffprobe from it.
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        Self {
            ffprobe_path: derive_ffprobe_path(&ffmpeg_path),
            ffmpeg_path,
            heif_convert_path: "heif-convert".to_string(),
            thumb_ext: "jpg".to_string(),
            thumb_start_time: "00:00:01".to_string(),
            play_icon_path: None,
            transcode_timeout: Duration::from_secs(TRANSCODE_TIMEOUT_SECS),
            conversion_timeout: Duration::from_secs(CONVERSION_TIMEOUT_SECS),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// ffprobe ships next to ffmpeg, so the probe path is the ffmpeg path with the binary name swapped.
pub fn derive_ffprobe_path(ffmpeg_path: &str) -> String {
    ffmpeg_path.replace("ffmpeg", "ffprobe")
}

#[derive(Clone, Debug)]
pub struct Config {
    server: ServerConfig,
    storage: StorageConfig,
    tools: ToolConfig,
}

impl Config {
    pub fn new(server: ServerConfig, storage: StorageConfig, tools: ToolConfig) -> Self {
        Self {
            server,
            storage,
            tools,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server = ServerConfig {
            port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .unwrap_or(SERVER_PORT),
            cors_origins,
        };

        let max_file_size_mb: u64 = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let storage = StorageConfig {
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./data/uploads".to_string())
                .into(),
            temp_dir: env::var("TEMP_DIR")
                .unwrap_or_else(|_| "./data/tmp".to_string())
                .into(),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/media", server.port)),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
        };

        let ffmpeg_path = env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());
        let tools = ToolConfig {
            ffprobe_path: env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| derive_ffprobe_path(&ffmpeg_path)),
            ffmpeg_path,
            heif_convert_path: env::var("HEIF_CONVERT_PATH")
                .unwrap_or_else(|_| "heif-convert".to_string()),
            thumb_ext: env::var("FFMPEG_THUMB_EXT").unwrap_or_else(|_| "jpg".to_string()),
            thumb_start_time: env::var("FFMPEG_THUMB_START_TIME")
                .unwrap_or_else(|_| "00:00:01".to_string()),
            play_icon_path: env::var("PLAY_ICON_PATH").ok().map(PathBuf::from),
            transcode_timeout: Duration::from_secs(
                env::var("TRANSCODE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| TRANSCODE_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(TRANSCODE_TIMEOUT_SECS),
            ),
            conversion_timeout: Duration::from_secs(
                env::var("CONVERSION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| CONVERSION_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(CONVERSION_TIMEOUT_SECS),
            ),
        };

        let config = Self::new(server, storage, tools);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage.upload_dir.as_os_str().is_empty() {
            anyhow::bail!("UPLOAD_DIR must not be empty");
        }
        if self.storage.temp_dir.as_os_str().is_empty() {
            anyhow::bail!("TEMP_DIR must not be empty");
        }
        if self.storage.max_file_size_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE_MB must be greater than zero");
        }
        if self.tools.ffmpeg_path.trim().is_empty() {
            anyhow::bail!("FFMPEG_PATH must not be empty");
        }
        if self.tools.transcode_timeout.is_zero() || self.tools.conversion_timeout.is_zero() {
            anyhow::bail!("Tool timeouts must be greater than zero");
        }
        if self.tools.thumb_ext.trim().is_empty() {
            anyhow::bail!("FFMPEG_THUMB_EXT must not be empty");
        }
        Ok(())
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.server.cors_origins
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.storage.max_file_size_bytes
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.tools.ffmpeg_path
    }
}
