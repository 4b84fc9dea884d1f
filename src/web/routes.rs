//! # Web API Route Definitions
//!
//! Routes are grouped by resource and versioned under `/v1`.

use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;

/// Create API v1 routes
///
/// - Runs: creation, triggers, cancellation and status
/// - Sections: single-section generation
/// - Definitions: listing, saving and prerequisite edits
/// - Queue: administrative work list
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Runs
        .route("/runs", post(handlers::runs::create_run))
        .route("/runs/{run_id}", get(handlers::runs::get_run))
        .route("/orchestrate", post(handlers::runs::orchestrate))
        .route(
            "/runs/{run_id}/source-document",
            post(handlers::runs::ingest_source_document),
        )
        .route("/runs/{run_id}/cancel", post(handlers::runs::cancel_run))
        // Sections
        .route(
            "/sections/generate",
            post(handlers::sections::generate_section),
        )
        // Definitions
        .route(
            "/definitions",
            get(handlers::definitions::list_definitions).post(handlers::definitions::save_definition),
        )
        .route(
            "/definitions/{definition_id}/prerequisites",
            put(handlers::definitions::set_prerequisites),
        )
        // Queue
        .route(
            "/queue",
            get(handlers::queue::list_queue).post(handlers::queue::enqueue),
        )
        .route("/queue/bulk", post(handlers::queue::bulk_action))
        .route("/queue/retry-failed", post(handlers::queue::retry_failed))
        .route("/queue/{item_id}", delete(handlers::queue::delete_item))
        .route("/queue/{item_id}/cancel", post(handlers::queue::cancel_item))
        .route("/queue/{item_id}/retry", post(handlers::queue::retry_item))
}

/// Health routes, never versioned
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::basic_health))
}
