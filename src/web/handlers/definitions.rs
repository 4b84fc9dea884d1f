//! # Codex Definition Handlers

use crate::models::CodexDefinition;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PrerequisitesRequest {
    pub prerequisites: Vec<String>,
}

/// GET /v1/definitions
pub async fn list_definitions(State(state): State<AppState>) -> ApiResult<Json<Vec<CodexDefinition>>> {
    Ok(Json(state.definitions.list_definitions().await?))
}

/// POST /v1/definitions
pub async fn save_definition(
    State(state): State<AppState>,
    Json(definition): Json<CodexDefinition>,
) -> ApiResult<Json<CodexDefinition>> {
    Ok(Json(state.definitions.save_definition(definition).await?))
}

/// Replace prerequisites, rejecting cycles: PUT /v1/definitions/{definition_id}/prerequisites
pub async fn set_prerequisites(
    State(state): State<AppState>,
    Path(definition_id): Path<Uuid>,
    Json(request): Json<PrerequisitesRequest>,
) -> ApiResult<Json<CodexDefinition>> {
    Ok(Json(
        state
            .definitions
            .set_prerequisites(definition_id, request.prerequisites)
            .await?,
    ))
}
