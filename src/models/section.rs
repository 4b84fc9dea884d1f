//! # Section Model
//!
//! Smallest unit of generated content. Sections are owned by exactly one
//! codex and are created once, index-aligned with the codex's section
//! templates, when generation of that codex first starts.

use crate::state_machine::SectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: Uuid,
    pub codex_id: Uuid,
    pub section_index: i32,
    pub name: String,
    pub status: SectionState,
    pub content: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub regeneration_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New Section for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSection {
    pub section_index: i32,
    pub name: String,
}

impl Section {
    pub fn from_new(codex_id: Uuid, new_section: NewSection) -> Self {
        let now = Utc::now();
        Self {
            section_id: Uuid::new_v4(),
            codex_id,
            section_index: new_section.section_index,
            name: new_section.name,
            status: SectionState::Pending,
            content: None,
            error_message: None,
            retry_count: 0,
            regeneration_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Completed, non-empty content.
    pub fn completed_content(&self) -> Option<&str> {
        match self.status {
            SectionState::Completed => self.content.as_deref().filter(|c| !c.is_empty()),
            _ => None,
        }
    }
}
