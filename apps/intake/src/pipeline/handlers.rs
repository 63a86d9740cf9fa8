//! Axum route handlers for the résumé intake API.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::diagnostics::{ErrorCode, ParserError};
use crate::errors::AppError;
use crate::ingest::RawDocument;
use crate::pipeline::merge::{merge, MergeRequest, MergeResult};
use crate::pipeline::progress::{ProgressReporter, ProgressUpdate};
use crate::pipeline::{IntelligentPlacementResult, ParseOptionsOverride};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTextRequest {
    pub text: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub options: ParseOptionsOverride,
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

fn log_progress(update: ProgressUpdate) {
    debug!(percent = update.percent, status = %update.status, "parse progress");
}

/// A body over the router's limit is a too-large upload, not a malformed request.
fn multipart_error(err: MultipartError, what: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ParserError::new(ErrorCode::FileTooLarge, format!("{what}: {}", err.body_text()))
            .with_stage("upload")
            .into();
    }
    AppError::Validation(format!("{what}: {err}"))
}

/// POST /api/v1/resumes/parse
///
/// Multipart upload: `file` (required) and `options` (optional JSON).
pub async fn handle_parse(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IntelligentPlacementResult>, AppError> {
    let mut upload = None;
    let mut overrides = ParseOptionsOverride::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Multipart error"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read file"))?;
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read options"))?;
                overrides = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("Invalid options: {e}")))?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| {
        ParserError::new(ErrorCode::FileNotProvided, "multipart field 'file' is missing")
            .with_stage("upload")
    })?;
    let opts = overrides.apply(state.pipeline.defaults());
    let doc = RawDocument::new(upload.bytes, &upload.filename, upload.content_type);

    let mut progress = ProgressReporter::new(log_progress);
    let result = state.pipeline.process(doc, &opts, &mut progress).await?;
    Ok(Json(result))
}

/// POST /api/v1/resumes/analyze-text
pub async fn handle_analyze_text(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeTextRequest>,
) -> Result<Json<IntelligentPlacementResult>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    let opts = request.options.apply(state.pipeline.defaults());
    let filename = request.filename.unwrap_or_else(|| "pasted-text.txt".to_string());
    let text = request.text;
    let pipeline = state.pipeline.clone();

    let result = tokio::task::spawn_blocking(move || {
        pipeline.analyze_text(&text, &filename, &opts, &mut ProgressReporter::new(log_progress))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;
    Ok(Json(result))
}

/// POST /api/v1/resumes/merge
///
/// Applies reviewer corrections to already-processed data. No re-extraction.
pub async fn handle_merge(Json(request): Json<MergeRequest>) -> Json<MergeResult> {
    Json(merge(request))
}
