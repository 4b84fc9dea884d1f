//! # Codex Model
//!
//! Run-scoped instance of a codex definition. The definition is frozen onto
//! the row when the run is created, so the instance carries everything the
//! executor needs: section templates, prerequisites and execution strategy.

use super::codex_definition::CodexDefinition;
use crate::state_machine::CodexState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codex {
    pub codex_id: Uuid,
    pub run_id: Uuid,
    pub definition_id: Uuid,
    pub name: String,
    pub definition: CodexDefinition,
    pub status: CodexState,
    pub total_sections: i32,
    pub completed_sections: i32,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Codex {
    /// Freeze a definition into a new, not-started codex for a run.
    pub fn from_definition(run_id: Uuid, definition: CodexDefinition) -> Self {
        let now = Utc::now();
        Self {
            codex_id: Uuid::new_v4(),
            run_id,
            definition_id: definition.definition_id,
            name: definition.name.clone(),
            total_sections: definition.section_templates.len() as i32,
            definition,
            status: CodexState::NotStarted,
            completed_sections: 0,
            error_message: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.definition.prerequisites
    }

    pub fn has_sections(&self) -> bool {
        self.definition.has_sections()
    }

    pub fn depends_on_source_document(&self) -> bool {
        self.definition.depends_on_source_document
    }
}
