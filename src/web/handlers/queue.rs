//! # Queue Handlers
//!
//! Administrative queue operations. Single-item and bulk transitions share
//! the legality rules of the queue item state machine.

use crate::models::QueueItem;
use crate::orchestration::{BulkOutcome, BulkRequest, EnqueueRequest};
use crate::state_machine::QueueItemState;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct QueueListQuery {
    pub status: Option<String>,
}

/// GET /v1/queue?status=<status>
pub async fn list_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueListQuery>,
) -> ApiResult<Json<Vec<QueueItem>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<QueueItemState>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    Ok(Json(state.queue.list(status).await?))
}

/// POST /v1/queue
pub async fn enqueue(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<Vec<QueueItem>>)> {
    let items = state.queue.enqueue(request).await?;
    Ok((StatusCode::ACCEPTED, Json(items)))
}

/// POST /v1/queue/{item_id}/cancel
pub async fn cancel_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<QueueItem>> {
    Ok(Json(state.queue.cancel(item_id).await?))
}

/// POST /v1/queue/{item_id}/retry
pub async fn retry_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<QueueItem>)> {
    let item = state.queue.retry(item_id).await?;
    Ok((StatusCode::ACCEPTED, Json(item)))
}

/// DELETE /v1/queue/{item_id}
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.queue.delete(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/queue/bulk
pub async fn bulk_action(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.queue.bulk(request).await?))
}

/// POST /v1/queue/retry-failed
pub async fn retry_failed(State(state): State<AppState>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.queue.retry_all_failed().await?))
}
