//! Test helpers: build the router over a temporary upload root.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use mediaload_api::setup::initialize_app_with_hooks;
use mediaload_core::{
    Config, MediaArtifact, MediaHooks, ServerConfig, StorageConfig, ToolConfig,
};
use tempfile::TempDir;

/// Hooks that keep every finished artifact and can pretend a session was recorded.
#[derive(Default)]
pub struct RecordingHooks {
    pub ready: Mutex<Vec<MediaArtifact>>,
    pub processed: Mutex<Option<(String, String)>>,
}

impl RecordingHooks {
    pub fn artifacts(&self) -> Vec<MediaArtifact> {
        self.ready.lock().unwrap().clone()
    }

    pub fn mark_processed(&self, session_id: &str, media_id: &str) {
        *self.processed.lock().unwrap() = Some((session_id.to_string(), media_id.to_string()));
    }
}

#[async_trait]
impl MediaHooks for RecordingHooks {
    async fn on_media_ready(&self, artifact: MediaArtifact) -> Option<String> {
        let id = format!("media-{}", artifact.guid);
        self.ready.lock().unwrap().push(artifact);
        Some(id)
    }

    async fn check_already_processed(&self, session_id: &str) -> Option<String> {
        self.processed
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(sid, _)| sid == session_id)
            .map(|(_, id)| id.clone())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub hooks: Arc<RecordingHooks>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_dir(&self) -> PathBuf {
        self._temp_dir.path().join("uploads")
    }
}

pub fn test_config(root: &Path) -> Config {
    Config::new(
        ServerConfig {
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        StorageConfig {
            upload_dir: root.join("uploads"),
            temp_dir: root.join("tmp"),
            public_base_url: "http://cdn.test/media".to_string(),
            max_file_size_bytes: 10 * 1024 * 1024,
        },
        // Nonexistent binaries: every external tool call fails fast.
        ToolConfig::new("/nonexistent/ffmpeg"),
    )
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().unwrap();
    let hooks = Arc::new(RecordingHooks::default());
    let (_state, router) = initialize_app_with_hooks(&test_config(temp_dir.path()), hooks.clone())
        .await
        .unwrap();

    TestApp {
        server: TestServer::new(router.into_make_service()).expect("Failed to create test server"),
        hooks,
        _temp_dir: temp_dir,
    }
}

/// Multipart form for one part of a chunked upload.
pub fn part_form(uuid: &str, filename: &str, index: u32, total_parts: u32, total_size: u64, data: Vec<u8>) -> MultipartForm {
    let size = data.len();
    MultipartForm::new()
        .add_text("qquuid", uuid)
        .add_text("qqfilename", filename)
        .add_text("qqpartindex", index.to_string())
        .add_text("qqtotalparts", total_parts.to_string())
        .add_text("qqtotalfilesize", total_size.to_string())
        .add_text("qqchunksize", size.to_string())
        .add_part(
            "qqfile",
            Part::bytes(data).file_name("blob").mime_type("application/octet-stream"),
        )
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}
