//! # Web API Handlers
//!
//! Request handlers grouped by resource. Background work is acknowledged
//! with `202 Accepted`; the status rows it writes are the authoritative result.

pub mod definitions;
pub mod health;
pub mod queue;
pub mod runs;
pub mod sections;

use serde::Serialize;
use uuid::Uuid;

/// Acknowledgement for work handed to a background task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codex_id: Option<Uuid>,
    pub status: String,
}

impl AcceptedResponse {
    pub fn run(run_id: Uuid, status: impl ToString) -> Self {
        Self {
            accepted: true,
            run_id: Some(run_id),
            codex_id: None,
            status: status.to_string(),
        }
    }
}
