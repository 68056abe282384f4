//! Application setup and initialization

pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use mediaload_core::{Config, LoggingHooks, MediaHooks};
use mediaload_services::{ChunkAssembler, CommandInvoker, LocalStore, MediaPipeline, PipelineConfig};

use crate::state::AppState;

/// Build state and router from a validated configuration, with the default hooks.
pub async fn initialize_app(config: &Config) -> Result<(AppState, axum::Router)> {
    initialize_app_with_hooks(config, Arc::new(LoggingHooks)).await
}

pub async fn initialize_app_with_hooks(
    config: &Config,
    hooks: Arc<dyn MediaHooks>,
) -> Result<(AppState, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    let storage = config.storage();
    tokio::fs::create_dir_all(&storage.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp directory {}", storage.temp_dir.display()))?;

    let store = LocalStore::new(&storage.upload_dir, &storage.public_base_url)
        .await
        .context("Failed to initialize upload storage")?;

    let pipeline = MediaPipeline::new(
        PipelineConfig::new(
            &storage.upload_dir,
            &storage.public_base_url,
            config.tools().clone(),
        ),
        Arc::new(CommandInvoker::new()),
    );

    tracing::info!(
        upload_dir = %storage.upload_dir.display(),
        base_url = %storage.public_base_url,
        ffmpeg_path = %config.ffmpeg_path(),
        "Upload pipeline ready"
    );

    let assembler = Arc::new(ChunkAssembler::new(store, Arc::new(pipeline)));
    let state = AppState::new(assembler, hooks);
    let router = routes::setup_routes(config, state.clone())?;

    Ok((state, router))
}
