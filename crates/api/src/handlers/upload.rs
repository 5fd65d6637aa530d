//! Handlers for audio upload and the upload constraints endpoint.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use stemd_core::error::CoreError;
use stemd_core::quota::QuotaReason;
use stemd_db::repositories::UserQuotaRepo;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::state::AppState;

/// Accepted extension / MIME type pairs.
pub const ACCEPTED_FORMATS: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("ogg", "audio/ogg"),
];

fn accepted_extension(ext: &str) -> bool {
    ACCEPTED_FORMATS.iter().any(|(e, _)| *e == ext)
}

/// Response body for `GET /upload/constraints`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsResponse {
    /// Effective size cap in bytes.
    pub max_file_size: u64,
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: u64,
    /// Accepted MIME types.
    pub accepted_types: Vec<&'static str>,
    /// Accepted file extensions, with leading dot.
    pub accepted_extensions: Vec<String>,
}

/// GET /upload/constraints -- what this identity may upload.
///
/// The effective size cap is the tighter of the global cap and the
/// caller's own quota limit.
pub async fn constraints(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<ConstraintsResponse>> {
    let quota = UserQuotaRepo::get_or_create(&state.pool, &identity.user_id).await?;

    let max_file_size_mb = state
        .config
        .max_upload_size_mb
        .min(quota.max_file_size_mb.max(0) as u64);

    Ok(Json(ConstraintsResponse {
        max_file_size: max_file_size_mb * 1024 * 1024,
        max_file_size_mb,
        accepted_types: ACCEPTED_FORMATS.iter().map(|(_, mime)| *mime).collect(),
        accepted_extensions: ACCEPTED_FORMATS
            .iter()
            .map(|(ext, _)| format!(".{ext}"))
            .collect(),
    }))
}

/// Response body for `POST /upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Server-assigned stored filename.
    pub file_name: String,
    /// Full path to pass to `POST /separate` as `input_path`.
    pub input_path: String,
}

/// POST /upload -- store one audio file for later separation.
///
/// The body is streamed to disk and the size cap (the tighter of the
/// global and per-user limits, matching what `constraints` reports) is
/// enforced incrementally, so an oversized upload is aborted as soon as
/// it crosses the cap rather than after it has been fully received. The
/// partial file is deleted before the rejection is returned.
pub async fn upload(
    State(state): State<AppState>,
    identity: Identity,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let quota = UserQuotaRepo::get_or_create(&state.pool, &identity.user_id).await?;
    let max_size_mb = state
        .config
        .max_upload_size_mb
        .min(quota.max_file_size_mb.max(0) as u64);

    let field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
        {
            Some(field) if field.name() == Some("file") => break field,
            Some(_) => continue,
            None => {
                return Err(AppError::BadRequest(
                    "Missing multipart field 'file'".to_string(),
                ))
            }
        }
    };

    let original_filename = field
        .file_name()
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("Uploaded file must have a filename".to_string()))?;

    let extension = original_filename
        .rsplit('.')
        .next()
        .map(str::to_lowercase)
        .filter(|ext| accepted_extension(ext))
        .ok_or_else(|| {
            let accepted: Vec<_> = ACCEPTED_FORMATS.iter().map(|(ext, _)| *ext).collect();
            AppError::BadRequest(format!(
                "Unsupported file format. Accepted: {}",
                accepted.join(", ")
            ))
        })?;

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;

    // Server-assigned name: avoids collisions and path tricks in
    // client-supplied names.
    let file_name = format!("{}.{extension}", Uuid::new_v4());
    let path = state.config.upload_dir.join(&file_name);

    let max_bytes = max_size_mb * 1024 * 1024;
    match write_limited(&path, field, max_bytes).await {
        Ok(size_bytes) => {
            tracing::info!(
                file_name = %file_name,
                original = %original_filename,
                size_bytes,
                "Upload stored"
            );
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    file_name,
                    input_path: path.to_string_lossy().into_owned(),
                }),
            ))
        }
        Err(err) => {
            // Never leave a partial file behind.
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
            }
            Err(err)
        }
    }
}

/// Stream a multipart field to `path`, failing once `max_bytes` is
/// exceeded. Returns the number of bytes written on success.
async fn write_limited(
    path: &std::path::Path,
    mut field: axum::extract::multipart::Field<'_>,
    max_bytes: u64,
) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload file: {e}")))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(format!("Upload interrupted: {e}")))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(CoreError::QuotaExceeded {
                reason: QuotaReason::FileTooLarge,
                limit: (max_bytes / (1024 * 1024)) as i64,
                current: written.div_ceil(1024 * 1024) as i64,
            }
            .into());
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to flush upload: {e}")))?;
    Ok(written)
}
