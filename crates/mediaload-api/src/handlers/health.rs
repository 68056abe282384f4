use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub storage: String,
    pub active_sessions: usize,
}

/// Report whether the upload root is reachable
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.assembler.store();
    let (status, storage) = match tokio::fs::metadata(store.upload_dir()).await {
        Ok(meta) if meta.is_dir() => (StatusCode::OK, "healthy".to_string()),
        Ok(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "unhealthy: upload root is not a directory".to_string(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {}", e))
        }
    };

    let response = HealthCheckResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" }.to_string(),
        storage,
        active_sessions: state.assembler.active_sessions(),
    };

    (status, Json(response))
}
