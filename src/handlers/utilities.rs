// ---------------------------------------------------------------------------
// handlers/utilities.rs — extract / fetch / format / secret check
// ---------------------------------------------------------------------------

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::error::{ApiError, ApiErrorWithDetails};
use crate::extract::{extract_json_from_value, Extraction};
use crate::fetch::fetch_with_policy;
use crate::formatter::output_path;
use crate::models::{
    ExtractRequest, ExtractResponse, FetchRequest, FetchResponse, FormatRequest, FormatResponse,
    SecretCheckResponse, SecretQuery,
};
use crate::secrets::SecretManagerClient;
use crate::state::AppState;

/// POST /api/extract — recover a JSON payload from model output.
/// Never fails for unparseable text; `found` is `false` instead.
pub async fn extract(Json(req): Json<ExtractRequest>) -> Json<ExtractResponse> {
    let resp = match extract_json_from_value(&req.text) {
        Extraction::Parsed(value) => ExtractResponse { found: true, value },
        Extraction::NotFound => ExtractResponse { found: false, value: Value::Null },
    };
    Json(resp)
}

/// POST /api/fetch — GET a remote page and return its text.
pub async fn fetch(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<FetchResponse>, ApiErrorWithDetails> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".into()).into());
    }
    let content = fetch_with_policy(&state.fetch_client, &url, &state.fetch_policy).await?;
    Ok(Json(FetchResponse { url, bytes: content.len(), content }))
}

/// POST /api/format — format source and save it under the output directory.
pub async fn format(
    State(state): State<AppState>,
    Json(req): Json<FormatRequest>,
) -> Result<Json<FormatResponse>, ApiError> {
    let path = output_path(&state.config.format_output_dir, &req.filename).ok_or_else(|| {
        ApiError::BadRequest(format!("invalid filename '{}': use a bare file name", req.filename))
    })?;
    if req.source.trim().is_empty() {
        return Err(ApiError::BadRequest("source is empty".into()));
    }

    let written = state.formatter.format_to_file(&req.source, &path).await?;
    let bytes = tokio::fs::metadata(&written)
        .await
        .map(|m| m.len())
        .map_err(|e| ApiError::Internal(format!("cannot stat {}: {}", written.display(), e)))?;

    Ok(Json(FormatResponse { path: written.display().to_string(), bytes }))
}

/// GET /api/secrets/{secret_id} — verify a secret is readable.
/// Disabled unless `EXPOSE_SECRETS_ENDPOINT` is set; never returns the value.
pub async fn secret_check(
    State(state): State<AppState>,
    Path(secret_id): Path<String>,
    Query(q): Query<SecretQuery>,
) -> Result<Json<SecretCheckResponse>, ApiError> {
    if !state.config.expose_secrets_endpoint {
        return Err(ApiError::NotFound("secrets endpoint disabled".into()));
    }
    let project = q
        .project
        .or_else(|| state.config.gcp_project.clone())
        .ok_or_else(|| {
            ApiError::BadRequest("project is required (query or GOOGLE_CLOUD_PROJECT)".into())
        })?;
    let version = q.version.as_deref();

    let name = SecretManagerClient::version_name(&project, &secret_id, version)?;
    let value = state
        .secrets
        .access_secret_version(&project, &secret_id, version)
        .await?;

    Ok(Json(SecretCheckResponse { name, length: value.len() }))
}
