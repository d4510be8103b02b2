//! HTTP surface of the OCR filing service.
//!
//! Routes are nested under `/api/`. Handlers stay thin; all behavior lives
//! in `vault_core::processor`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use vault_core::limits::Plan;
use vault_core::models::{OcrOutcome, PreviewOutcome, ProcessRequest, SortOutcome};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ocr/process", post(process_document))
        .route("/api/ocr/retry", post(retry_document))
        .route("/api/ocr/preview", post(preview))
        .route("/api/ocr/usage", get(usage))
        .route("/api/documents/:id/sort", post(sort_document))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn process_document(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Json<OcrOutcome> {
    Json(state.processor.process_document(&request).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetryRequest {
    document_id: String,
    user_id: String,
}

async fn retry_document(
    State(state): State<AppState>,
    Json(request): Json<RetryRequest>,
) -> Json<OcrOutcome> {
    Json(
        state
            .processor
            .retry_process(&request.document_id, &request.user_id)
            .await,
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    storage_key: String,
    file_name: String,
    mime_type: String,
}

async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewOutcome> {
    Json(
        state
            .processor
            .preview_classification(&request.storage_key, &request.file_name, &request.mime_type)
            .await,
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortRequest {
    folder_id: String,
}

async fn sort_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<SortRequest>,
) -> Json<SortOutcome> {
    Json(
        state
            .processor
            .manual_sort(&document_id, &request.folder_id)
            .await,
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageQuery {
    user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageResponse {
    user_id: String,
    plan: String,
    pages_used: i64,
    pages_limit: i64,
}

async fn usage(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, ApiError> {
    let tracker = state.processor.usage();
    let user = tracker
        .load_user(&query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", query.user_id)))?;

    let plan = user.plan.clone().unwrap_or_else(|| "free".to_string());
    let pages_limit = Plan::from_name(user.plan.as_deref()).ocr_pages_per_month();
    let pages_used = tracker.current_usage(&query.user_id).await?;

    Ok(Json(UsageResponse {
        user_id: query.user_id,
        plan,
        pages_used,
        pages_limit,
    }))
}
