//! # Run Handlers
//!
//! Run creation, full-run orchestration triggers, source document ingestion,
//! cancellation and status reads.

use super::AcceptedResponse;
use crate::models::RunInput;
use crate::orchestration::RunSummary;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    pub subject: String,
    #[serde(default)]
    pub input: RunInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrateRequest {
    pub run_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SourceDocumentRequest {
    pub document: String,
}

/// Create a run and start orchestrating it: POST /v1/runs
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    if request.subject.trim().is_empty() {
        return Err(ApiError::bad_request("Subject cannot be empty"));
    }

    let run = state
        .orchestrator
        .create_run(request.subject, request.input)
        .await?;
    info!(run_id = %run.run_id, "Run created via web API");

    state.spawn_orchestration(run.run_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::run(run.run_id, run.status)),
    ))
}

/// Run with per-codex progress: GET /v1/runs/{run_id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunSummary>> {
    Ok(Json(state.orchestrator.run_status(run_id).await?))
}

/// Full-run orchestration trigger: POST /v1/orchestrate
pub async fn orchestrate(
    State(state): State<AppState>,
    Json(request): Json<OrchestrateRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let summary = state.orchestrator.run_status(request.run_id).await?;
    state.spawn_orchestration(request.run_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::run(request.run_id, summary.status)),
    ))
}

/// Attach a source document and re-trigger: POST /v1/runs/{run_id}/source-document
pub async fn ingest_source_document(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<SourceDocumentRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let run = state
        .orchestrator
        .ingest_source_document(run_id, &request.document)
        .await?;
    info!(run_id = %run_id, bytes = request.document.len(), "Source document ingested");

    state.spawn_orchestration(run_id);
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::run(run_id, run.status)),
    ))
}

/// Cooperative cancellation: POST /v1/runs/{run_id}/cancel
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<RunSummary>> {
    Ok(Json(state.orchestrator.request_cancellation(run_id).await?))
}
