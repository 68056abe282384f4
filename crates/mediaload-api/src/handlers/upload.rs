//! Upload handlers
//!
//! One `POST /upload` endpoint accepts single parts, whole files and
//! method-overridden deletes, using the multipart field names of the
//! fine-uploader protocol (`qquuid`, `qqpartindex`, ...).

use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use mediaload_core::{AppError, PartUpload, UploadSession};

use crate::error::HttpAppError;
use crate::state::AppState;

const DEFAULT_FILENAME: &str = "unknown";

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

impl UploadResponse {
    fn ok(media_id: Option<String>) -> Self {
        Self {
            success: true,
            media_id,
        }
    }
}

/// Raw multipart fields of one upload request
#[derive(Debug, Default)]
pub struct UploadForm {
    pub uuid: Option<String>,
    pub data: Option<Bytes>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub qq_filename: Option<String>,
    pub original: Option<String>,
    pub total_file_size: Option<String>,
    pub total_parts: Option<String>,
    pub part_index: Option<String>,
    pub chunk_size: Option<String>,
    pub keep_original: Option<String>,
    pub generate_error: Option<String>,
    pub method: Option<String>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read multipart: {}", e)))?
        {
            let name = field.name().map(|s| s.to_string()).unwrap_or_default();

            if name == "qqfile" {
                if form.data.is_some() {
                    return Err(AppError::Validation(
                        "Multiple qqfile fields are not allowed".to_string(),
                    ));
                }
                form.file_name = field.file_name().map(|s| s.to_string());
                form.content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file data: {}", e)))?;
                form.data = Some(data);
                continue;
            }

            let slot = match name.as_str() {
                "qquuid" => &mut form.uuid,
                "qqfilename" => &mut form.qq_filename,
                "original" => &mut form.original,
                "qqtotalfilesize" => &mut form.total_file_size,
                "qqtotalparts" => &mut form.total_parts,
                "qqpartindex" => &mut form.part_index,
                "qqchunksize" => &mut form.chunk_size,
                "keepOriginal" => &mut form.keep_original,
                "generateError" => &mut form.generate_error,
                "_method" => &mut form.method,
                _ => continue,
            };
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read field {}: {}", name, e)))?;
            *slot = Some(value);
        }

        Ok(form)
    }

    pub fn session_id(&self) -> Result<&str, AppError> {
        self.uuid
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("qquuid is required".to_string()))
    }

    pub fn is_delete(&self) -> bool {
        self.method
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("DELETE"))
    }

    /// Target filename: `original`, then `qqfilename`, then the part's own filename.
    pub fn filename(&self) -> String {
        [&self.original, &self.qq_filename, &self.file_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string()
    }

    pub fn into_part_upload(self) -> Result<PartUpload, AppError> {
        if is_flag_set(self.generate_error.as_deref()) {
            return Err(AppError::Validation("Generated error".to_string()));
        }

        let session_id = self.session_id()?.to_string();
        let filename = self.filename();
        let total_parts = parse_field::<u32>("qqtotalparts", self.total_parts.as_deref())?;
        let total_size = parse_field::<u64>("qqtotalfilesize", self.total_file_size.as_deref())?;
        let part_index = parse_field::<u32>("qqpartindex", self.part_index.as_deref())?;
        let declared_part_size = parse_field::<u64>("qqchunksize", self.chunk_size.as_deref())?;
        let data = self
            .data
            .ok_or_else(|| AppError::Validation("qqfile is required".to_string()))?;

        Ok(PartUpload {
            session: UploadSession {
                session_id,
                total_parts,
                total_size,
                filename,
                keep_original: is_flag_set(self.keep_original.as_deref()),
            },
            part_index,
            declared_part_size,
            content_type: self.content_type,
            data,
        })
    }
}

/// Parse an optional numeric field; blank counts as absent, garbage is a validation error.
fn parse_field<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{} is not a valid number: {}", name, v))),
    }
}

fn is_flag_set(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Accept one part, a whole file, or a `_method=DELETE` override
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = UploadForm::from_multipart(multipart).await?;

    if form.is_delete() {
        let session_id = form.session_id()?;
        state.assembler.delete_session(session_id).await?;
        return Ok(Json(UploadResponse::ok(None)));
    }

    let part = form.into_part_upload()?;
    let outcome = state.assembler.ingest(part, state.hooks.as_ref()).await?;

    Ok(Json(UploadResponse::ok(
        outcome.media_id().map(|id| id.to_string()),
    )))
}

/// Remove every part of a session
pub async fn delete_upload(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.assembler.delete_session(&uuid).await?;
    Ok(Json(UploadResponse::ok(None)))
}
