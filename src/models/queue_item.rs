//! # Queue Item Model
//!
//! Administrative intent to generate one codex for one subject. Processing an
//! item creates or reuses a run and codex; the item itself is retried,
//! cancelled and deleted independently of them.

use crate::state_machine::QueueItemState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub item_id: Uuid,
    pub subject: String,
    pub definition_id: Uuid,
    pub run_id: Option<Uuid>,
    pub status: QueueItemState,
    pub provider_id: Option<String>,
    pub model: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// New QueueItem for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub subject: String,
    pub definition_id: Uuid,
    pub run_id: Option<Uuid>,
    pub provider_id: Option<String>,
    pub model: Option<String>,
}

impl QueueItem {
    pub fn from_new(new_item: NewQueueItem) -> Self {
        let now = Utc::now();
        Self {
            item_id: Uuid::new_v4(),
            subject: new_item.subject,
            definition_id: new_item.definition_id,
            run_id: new_item.run_id,
            status: QueueItemState::Pending,
            provider_id: new_item.provider_id,
            model: new_item.model,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Provider/model assigned by the administrator, when both are present.
    pub fn assigned_model(&self) -> Option<(&str, &str)> {
        match (self.provider_id.as_deref(), self.model.as_deref()) {
            (Some(provider), Some(model)) => Some((provider, model)),
            _ => None,
        }
    }
}
