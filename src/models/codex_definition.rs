//! # Codex Definition Model
//!
//! Reusable, versioned template for one kind of codex: ordered section
//! templates, prerequisite codexes (by name), an optional dependency on the
//! run's source document, word-count bounds and the execution strategy used
//! to produce each section.
//!
//! Definitions are edited by administrators. A run freezes the definitions
//! active at creation time onto its codex rows, so later edits never affect
//! in-flight generation.

use crate::error::{CodexError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One provider + model pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStep {
    pub provider_id: String,
    pub model: String,
}

impl ModelStep {
    pub fn new(provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
        }
    }
}

/// One step of a sequential chain, optionally prefixed with its own instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStep {
    #[serde(flatten)]
    pub step: ModelStep,
    #[serde(default)]
    pub instruction: Option<String>,
}

/// Strategy by which one or more model calls produce one section's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionConfig {
    /// One provider call.
    Single { step: ModelStep },
    /// Concurrent generation steps synthesised by a merge call.
    #[serde(rename_all = "camelCase")]
    ParallelMerge {
        generators: Vec<ModelStep>,
        merge: ModelStep,
        merge_instruction: String,
    },
    /// Ordered refinement where each step consumes the previous output.
    SequentialChain { steps: Vec<ChainStep> },
}

impl ExecutionConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::ParallelMerge { .. } => "parallel_merge",
            Self::SequentialChain { .. } => "sequential_chain",
        }
    }

    /// Reject configurations that cannot produce output.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Single { .. } => Ok(()),
            Self::ParallelMerge { generators, .. } if generators.is_empty() => Err(
                CodexError::ValidationError(
                    "parallel_merge requires at least one generation step".to_string(),
                ),
            ),
            Self::ParallelMerge { .. } => Ok(()),
            Self::SequentialChain { steps } if steps.is_empty() => Err(
                CodexError::ValidationError("sequential_chain requires at least one step".to_string()),
            ),
            Self::SequentialChain { .. } => Ok(()),
        }
    }
}

/// Template for one section of a codex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTemplate {
    pub name: String,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCountBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for WordCountBounds {
    fn default() -> Self {
        Self { min: 300, max: 1200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexDefinition {
    pub definition_id: Uuid,
    pub name: String,
    pub version: i32,
    pub display_order: i32,
    pub is_active: bool,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub section_templates: Vec<SectionTemplate>,
    /// Names of codex definitions whose output must exist first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub depends_on_source_document: bool,
    #[serde(default)]
    pub word_count: WordCountBounds,
    pub execution: ExecutionConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodexDefinition {
    /// Minimal active definition, mostly useful for seeding and tests.
    pub fn new(name: impl Into<String>, execution: ExecutionConfig) -> Self {
        let now = Utc::now();
        Self {
            definition_id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            display_order: 0,
            is_active: true,
            system_prompt: String::new(),
            section_templates: Vec::new(),
            prerequisites: Vec::new(),
            depends_on_source_document: false,
            word_count: WordCountBounds::default(),
            execution,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_sections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.section_templates = names
            .into_iter()
            .map(|name| SectionTemplate {
                name: name.into(),
                instruction: String::new(),
            })
            .collect();
        self
    }

    pub fn with_prerequisites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_display_order(mut self, display_order: i32) -> Self {
        self.display_order = display_order;
        self
    }

    pub fn depending_on_source_document(mut self) -> Self {
        self.depends_on_source_document = true;
        self
    }

    pub fn has_sections(&self) -> bool {
        !self.section_templates.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CodexError::ValidationError(
                "codex definition name cannot be empty".to_string(),
            ));
        }
        if self.word_count.min > self.word_count.max {
            return Err(CodexError::ValidationError(format!(
                "word count bounds for '{}' are inverted ({} > {})",
                self.name, self.word_count.min, self.word_count.max
            )));
        }
        self.execution.validate()
    }
}
