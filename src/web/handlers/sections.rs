//! # Section Handlers

use super::AcceptedResponse;
use crate::error::CodexError;
use crate::orchestration::SectionRequest;
use crate::state_machine::CodexState;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::error;

/// Single-section generation: POST /v1/sections/generate
///
/// The request is validated up front; generation itself runs in the
/// background and reports through the section and codex rows.
pub async fn generate_section(
    State(state): State<AppState>,
    Json(request): Json<SectionRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let codex = state
        .store
        .get_codex(request.codex_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(CodexError::codex_not_found(request.codex_id)))?;
    if codex.name != request.codex_name {
        return Err(ApiError::bad_request(format!(
            "Codex {} is '{}', not '{}'",
            codex.codex_id, codex.name, request.codex_name
        )));
    }
    if request.section_index < 0 || request.section_index >= codex.total_sections {
        return Err(ApiError::bad_request(format!(
            "Section index {} out of range for '{}'",
            request.section_index, codex.name
        )));
    }
    let executor = state.orchestrator.executor().clone();
    if matches!(codex.status, CodexState::NotStarted | CodexState::Failed) {
        executor.ensure_prerequisites_ready(&codex).await?;
    }
    let run = state
        .store
        .get_run(codex.run_id)
        .await?
        .ok_or_else(|| ApiError::from(CodexError::run_not_found(codex.run_id)))?;

    let subject = run.subject;
    let background = request.clone();
    tokio::spawn(async move {
        if let Err(e) = executor.generate_single_section(&background, &subject).await {
            error!(codex_id = %background.codex_id, error = %e, "Single-section generation failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            run_id: Some(codex.run_id),
            codex_id: Some(codex.codex_id),
            status: "generating".to_string(),
        }),
    ))
}
