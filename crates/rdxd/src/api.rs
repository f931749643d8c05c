//! HTTP surface
//!
//! Endpoints:
//!   POST /documents                 multipart upload (field `document` or `file`)
//!   GET  /documents                 list records
//!   GET  /documents/{id}            one record
//!   POST /documents/{id}/analyze    detect sensitive fields
//!   POST /documents/{id}/redact     form `passkey`; returns the redacted artifact
//!   POST /documents/{id}/restore    form `passkey`; returns the restored document
//!   GET  /healthz                   liveness
//!   GET  /metrics                   Prometheus text format
//!
//! Record views carry masked previews only. Internal failures answer with a
//! generic body; the cause stays in the server log.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use prometheus_client::registry::Registry;
use rdx_core::error::ErrorKind;
use rdx_core::types::DocumentId;
use rdx_core::{RdxError, RdxResult};
use rdx_engine::Redactor;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics::{render, RdxMetrics};

#[derive(Clone)]
pub struct AppState {
    pub redactor: Arc<Redactor>,
    pub metrics: RdxMetrics,
    pub registry: Arc<Registry>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/documents", post(upload).get(list_documents))
        .route("/documents/{id}", get(get_document))
        .route("/documents/{id}/analyze", post(analyze))
        .route("/documents/{id}/redact", post(redact))
        .route("/documents/{id}/restore", post(restore))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// [`RdxError`] as an HTTP response.
pub struct ApiError(RdxError);

impl From<RdxError> for ApiError {
    fn from(e: RdxError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            ErrorKind::Authentication => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            ErrorKind::Internal => {
                error!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error; see server log".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct PasskeyForm {
    passkey: String,
}

fn parse_id(raw: &str) -> RdxResult<DocumentId> {
    raw.parse()
        .map_err(|_| RdxError::NotFound(format!("unknown document {raw}")))
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RdxError::Validation(format!("malformed multipart body: {e}")))?
    {
        if !matches!(field.name(), Some("document") | Some("file")) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| RdxError::Validation(format!("reading upload: {e}")))?;

        let record = state.redactor.upload(&filename, &content).await?;
        return Ok(Json(json!({ "document": record.view() })).into_response());
    }
    Err(RdxError::Validation("multipart field `document` is missing".into()).into())
}

async fn list_documents(State(state): State<AppState>) -> Json<serde_json::Value> {
    let views: Vec<_> = state
        .redactor
        .list()
        .await
        .iter()
        .map(|r| r.view())
        .collect();
    Json(json!({ "documents": views }))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let record = state.redactor.get(&parse_id(&id)?).await?;
    Ok(Json(json!({ "document": record.view() })))
}

async fn analyze(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let record = state.redactor.analyze(&parse_id(&id)?).await?;
    Ok(Json(json!({ "document": record.view() })))
}

async fn redact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PasskeyForm>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let result = state
        .redactor
        .redact(&id, SecretString::from(form.passkey))
        .await;
    state.metrics.redaction(&result);
    let redaction = result?;

    state.metrics.unmatched(redaction.report.unmatched.len());
    info!(document = %id, "redacted artifact returned");
    artifact_response(
        &redaction.record.media_type,
        &format!("redacted_{}", redaction.record.filename),
        redaction.report.unmatched.len(),
        redaction.artifact,
    )
}

async fn restore(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PasskeyForm>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let result = state
        .redactor
        .restore(&id, SecretString::from(form.passkey))
        .await;
    state.metrics.restore(&result);
    let restoration = result?;

    state.metrics.unmatched(restoration.report.unmatched.len());
    info!(document = %id, "restored document returned");
    artifact_response(
        &restoration.record.media_type,
        &format!("restored_{}", restoration.record.filename),
        restoration.report.unmatched.len(),
        restoration.document,
    )
}

fn artifact_response(
    media_type: &str,
    filename: &str,
    unmatched: usize,
    body: Vec<u8>,
) -> ApiResult<Response> {
    let content_type = HeaderValue::from_str(media_type)
        .map_err(|e| RdxError::Other(anyhow::anyhow!("content type header: {e}")))?;
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\'], "_")
    ))
    .map_err(|e| RdxError::Other(anyhow::anyhow!("content disposition header: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (
                HeaderName::from_static("x-rdx-unmatched-fields"),
                HeaderValue::from(unmatched),
            ),
        ],
        body,
    )
        .into_response())
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match render(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}
