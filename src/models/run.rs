//! # Run Model
//!
//! One subject's end-to-end generation request. A run owns one codex instance
//! per codex definition that was active when it was created.
//!
//! ## Database Schema
//!
//! Maps to `codex_runs`:
//! ```sql
//! CREATE TABLE codex_runs (
//!   run_id UUID PRIMARY KEY,
//!   subject TEXT NOT NULL,
//!   answers JSONB NOT NULL DEFAULT '{}',
//!   source_document TEXT,
//!   status TEXT NOT NULL DEFAULT 'pending',
//!   cancel_requested BOOLEAN NOT NULL DEFAULT false,
//!   -- timestamps
//! );
//! ```

use crate::state_machine::RunState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured answers and/or a raw source document submitted for a subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub answers: serde_json::Value,
    #[serde(default)]
    pub source_document: Option<String>,
}

impl RunInput {
    /// The source document, if one has been attached and is not blank.
    pub fn source_document(&self) -> Option<&str> {
        self.source_document
            .as_deref()
            .filter(|doc| !doc.trim().is_empty())
    }

    /// Render the structured answers as prompt context.
    pub fn answers_context(&self) -> String {
        match &self.answers {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub subject: String,
    pub input: RunInput,
    pub status: RunState,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// New Run for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRun {
    pub subject: String,
    pub input: RunInput,
}

impl Run {
    /// Build a pending run from a creation request.
    pub fn from_new(new_run: NewRun) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            subject: new_run.subject,
            input: new_run.input,
            status: RunState::Pending,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
