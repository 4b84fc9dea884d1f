//! # Section Batch Executor
//!
//! Drives every section of one codex through the [`ExecutionModeEngine`].
//!
//! ## Flow
//!
//! 1. Sections are initialized once per codex, index-aligned with the frozen
//!    section templates. The store makes initialization a no-op when rows
//!    already exist, so re-entrant orchestration reuses a partial prior
//!    attempt.
//! 2. Sections that still need generation run in fixed-size batches. Every
//!    section in a batch runs concurrently; the next batch starts only after
//!    the whole batch settles.
//! 3. A failing section is marked `error` and never aborts its siblings.
//! 4. The codex outcome derives from the error count once all batches ran.
//!
//! Cancellation is cooperative: the codex row's flag is read before each
//! batch and each section. In-flight provider calls always finish.

use super::errors::ExecutionError;
use super::execution_mode::{ExecutionContext, ExecutionModeEngine};
use super::prompts::{section_prompt, system_prompt, SectionPromptInput};
use crate::constants::CANCELLED_MESSAGE;
use crate::database::CodexStore;
use crate::error::{CodexError, Result};
use crate::logging::{log_codex_operation, log_section_operation};
use crate::models::{Codex, NewSection, Section};
use crate::state_machine::{
    CodexEvent, CodexState, CodexStateMachine, SectionEvent, SectionState, SectionStateMachine,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Inputs shared by every section of one codex
#[derive(Debug, Clone, Default)]
pub struct CodexGenerationInput {
    pub subject: String,
    pub input_context: String,
    pub prerequisite_content: Option<String>,
}

/// Final state of one codex pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexOutcome {
    pub codex_id: Uuid,
    pub status: CodexState,
    pub total_sections: usize,
    pub completed_sections: usize,
    pub errored_sections: usize,
    pub cancelled: bool,
}

/// Single-section generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub codex_id: Uuid,
    pub codex_name: String,
    pub section_index: i32,
    #[serde(default)]
    pub input_context: String,
    #[serde(default)]
    pub prerequisite_content: Option<String>,
}

pub struct SectionBatchExecutor {
    store: Arc<dyn CodexStore>,
    engine: Arc<ExecutionModeEngine>,
    batch_size: usize,
}

impl SectionBatchExecutor {
    pub fn new(store: Arc<dyn CodexStore>, engine: Arc<ExecutionModeEngine>, batch_size: usize) -> Self {
        Self {
            store,
            engine,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Create the codex's sections unless they exist; returns all of them by index
    pub async fn initialize_sections(&self, codex: &Codex) -> Result<Vec<Section>> {
        let new_sections = codex
            .definition
            .section_templates
            .iter()
            .enumerate()
            .map(|(index, template)| NewSection {
                section_index: index as i32,
                name: template.name.clone(),
            })
            .collect();

        self.store
            .initialize_sections(codex.codex_id, new_sections)
            .await
    }

    /// Generate every outstanding section of a codex and settle its status
    #[instrument(skip(self, input), fields(codex_id = %codex_id))]
    pub async fn execute_codex(&self, codex_id: Uuid, input: &CodexGenerationInput) -> Result<CodexOutcome> {
        let mut codex = self.load_codex(codex_id).await?;

        if codex.cancel_requested {
            return self.settle_cancelled(codex).await;
        }

        match codex.status {
            CodexState::NotStarted => {
                CodexStateMachine::apply(&mut codex, &CodexEvent::Start)?;
                self.store.update_codex(&codex).await?;
                log_codex_operation(
                    "generation_started",
                    Some(codex.run_id),
                    codex.codex_id,
                    &codex.name,
                    "generating",
                    None,
                );
            }
            CodexState::Generating => {
                info!(codex = %codex.name, "Resuming interrupted codex generation");
            }
            other => {
                return Err(CodexError::OrchestrationError(format!(
                    "codex '{}' is {other} and cannot be generated",
                    codex.name
                )))
            }
        }

        match self.run_batches(&mut codex, input).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(codex = %codex.name, error = %e, "Codex generation failed");
                self.fail_codex(&mut codex, e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run_batches(&self, codex: &mut Codex, input: &CodexGenerationInput) -> Result<CodexOutcome> {
        let sections = self.initialize_sections(codex).await?;
        let outstanding: Vec<Section> = sections
            .into_iter()
            .filter(|s| s.status.needs_generation())
            .collect();
        let context = ExecutionContext {
            run_id: Some(codex.run_id),
            codex_id: Some(codex.codex_id),
        };

        debug!(
            outstanding = outstanding.len(),
            batch_size = self.batch_size,
            "Processing codex sections"
        );

        let mut cancelled = false;
        for batch in outstanding.chunks(self.batch_size) {
            if self.cancellation_requested(codex.codex_id).await? {
                cancelled = true;
                break;
            }

            let snapshot: &Codex = codex;
            let results = join_all(
                batch
                    .iter()
                    .cloned()
                    .map(|section| self.run_section(snapshot, section, input, context)),
            )
            .await;

            for result in results {
                match result {
                    Ok(SectionRun::Cancelled) => cancelled = true,
                    Ok(SectionRun::Finished(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            let sections = self.store.list_sections(codex.codex_id).await?;
            codex.completed_sections = count(&sections, SectionState::Completed) as i32;
            self.store.update_codex(codex).await?;

            if cancelled {
                break;
            }
        }

        if cancelled {
            return self.settle_cancelled(codex.clone()).await;
        }

        let sections = self.store.list_sections(codex.codex_id).await?;
        let total = sections.len();
        let completed = count(&sections, SectionState::Completed);
        let errored = total - completed;

        codex.completed_sections = completed as i32;
        let status = CodexStateMachine::apply(
            codex,
            &CodexEvent::Complete {
                errored_sections: errored,
                total_sections: total,
            },
        )?;
        self.store.update_codex(codex).await?;

        log_codex_operation(
            "generation_finished",
            Some(codex.run_id),
            codex.codex_id,
            &codex.name,
            &status.to_string(),
            codex.error_message.as_deref(),
        );

        Ok(CodexOutcome {
            codex_id: codex.codex_id,
            status,
            total_sections: total,
            completed_sections: completed,
            errored_sections: errored,
            cancelled: false,
        })
    }

    async fn run_section(
        &self,
        codex: &Codex,
        section: Section,
        input: &CodexGenerationInput,
        context: ExecutionContext,
    ) -> Result<SectionRun> {
        if self.cancellation_requested(codex.codex_id).await? {
            return Ok(SectionRun::Cancelled);
        }
        let prompt_input = SectionPromptInput {
            subject: &input.subject,
            input_context: &input.input_context,
            prerequisite_content: input.prerequisite_content.as_deref(),
        };
        self.generate_section(codex, section, &prompt_input, context)
            .await
            .map(SectionRun::Finished)
    }

    /// Run one section through the engine and persist the outcome
    async fn generate_section(
        &self,
        codex: &Codex,
        mut section: Section,
        input: &SectionPromptInput<'_>,
        context: ExecutionContext,
    ) -> Result<SectionState> {
        let begin = SectionStateMachine::begin_event(section.status);
        SectionStateMachine::apply(&mut section, begin)?;
        self.store.update_section(&section).await?;

        let result = match codex
            .definition
            .section_templates
            .get(section.section_index as usize)
        {
            Some(template) => {
                let prompt = section_prompt(codex, template, section.section_index as usize, input);
                self.engine
                    .execute(&codex.definition.execution, &system_prompt(codex), &prompt, context)
                    .await
                    .and_then(|output| {
                        if output.content.trim().is_empty() {
                            Err(ExecutionError::InvalidConfiguration(
                                "generation returned empty content".to_string(),
                            ))
                        } else {
                            Ok(output)
                        }
                    })
            }
            None => Err(ExecutionError::InvalidConfiguration(format!(
                "no section template at index {}",
                section.section_index
            ))),
        };

        let mut usage_details = None;
        let event = match result {
            Ok(output) => {
                let tokens: u64 = output.usage.iter().map(|call| call.usage.total_tokens).sum();
                usage_details = Some(format!("{} provider calls, {tokens} tokens", output.usage.len()));
                SectionEvent::Complete(output.content)
            }
            Err(e) => {
                warn!(
                    codex = %codex.name,
                    section_index = section.section_index,
                    error = %e,
                    "Section generation failed"
                );
                SectionEvent::fail_with_error(e.to_string())
            }
        };
        let status = SectionStateMachine::apply(&mut section, event)?;
        self.store.update_section(&section).await?;

        log_section_operation(
            "generate_section",
            codex.codex_id,
            section.section_index,
            &section.name,
            &status.to_string(),
            section.error_message.as_deref().or(usage_details.as_deref()),
        );

        Ok(status)
    }

    /// Regenerate one section and recompute the codex status
    ///
    /// Errored sections are retried and completed ones regenerated. A
    /// `not_started` or `failed` codex must have every prerequisite ready; a
    /// failed one is reset first. The codex status is recomputed afterwards
    /// unless a full pass owns it.
    #[instrument(skip(self, request), fields(codex_id = %request.codex_id, section_index = request.section_index))]
    pub async fn generate_single_section(&self, request: &SectionRequest, subject: &str) -> Result<Section> {
        let mut codex = self.load_codex(request.codex_id).await?;
        if codex.name != request.codex_name {
            return Err(CodexError::ValidationError(format!(
                "codex {} is '{}', not '{}'",
                codex.codex_id, codex.name, request.codex_name
            )));
        }
        if request.section_index < 0 || request.section_index >= codex.total_sections {
            return Err(CodexError::ValidationError(format!(
                "section index {} out of range for '{}' ({} sections)",
                request.section_index, codex.name, codex.total_sections
            )));
        }

        let was_generating = codex.status.is_active();
        if matches!(codex.status, CodexState::NotStarted | CodexState::Failed) {
            self.ensure_prerequisites_ready(&codex).await?;
        }
        if codex.status == CodexState::Failed {
            CodexStateMachine::apply(&mut codex, &CodexEvent::Reset)?;
            self.store.update_codex(&codex).await?;
        }

        let sections = self.initialize_sections(&codex).await?;
        let section = sections
            .into_iter()
            .find(|s| s.section_index == request.section_index)
            .ok_or_else(|| CodexError::not_found("Section", request.section_index))?;

        let input = SectionPromptInput {
            subject,
            input_context: &request.input_context,
            prerequisite_content: request.prerequisite_content.as_deref(),
        };
        let context = ExecutionContext {
            run_id: Some(codex.run_id),
            codex_id: Some(codex.codex_id),
        };
        self.generate_section(&codex, section, &input, context).await?;

        let sections = self.store.list_sections(codex.codex_id).await?;
        if !was_generating {
            // A run loop may have picked the codex up meanwhile
            let mut latest = self.load_codex(codex.codex_id).await?;
            if !latest.status.is_active() {
                self.recompute_status(&mut latest, &sections).await?;
            }
        }

        sections
            .into_iter()
            .find(|s| s.section_index == request.section_index)
            .ok_or_else(|| CodexError::not_found("Section", request.section_index))
    }

    /// Reject generation of a codex whose prerequisites have not finished
    pub async fn ensure_prerequisites_ready(&self, codex: &Codex) -> Result<()> {
        let codexes = self.store.list_codexes(codex.run_id).await?;
        let waiting: Vec<&str> = codex
            .prerequisites()
            .iter()
            .map(String::as_str)
            .filter(|name| {
                !codexes
                    .iter()
                    .any(|c| c.name == *name && (c.status.satisfies_dependencies() || !c.has_sections()))
            })
            .collect();

        if waiting.is_empty() {
            Ok(())
        } else {
            Err(CodexError::ValidationError(format!(
                "codex '{}' has prerequisites that are not ready: {}",
                codex.name,
                waiting.join(", ")
            )))
        }
    }

    /// Settle the codex once every section has an outcome; until then it
    /// keeps its status so orchestration can finish the rest
    async fn recompute_status(&self, codex: &mut Codex, sections: &[Section]) -> Result<()> {
        let total = sections.len();
        let completed = count(sections, SectionState::Completed);
        let errored = count(sections, SectionState::Error);
        let unfinished = total - completed - errored;

        codex.completed_sections = completed as i32;
        if unfinished == 0 {
            if codex.status == CodexState::NotStarted {
                CodexStateMachine::apply(codex, &CodexEvent::Start)?;
            }
            CodexStateMachine::apply(
                codex,
                &CodexEvent::Complete {
                    errored_sections: errored,
                    total_sections: total,
                },
            )?;
        }
        let status = codex.status;
        self.store.update_codex(codex).await?;

        log_codex_operation(
            "status_recomputed",
            Some(codex.run_id),
            codex.codex_id,
            &codex.name,
            &status.to_string(),
            codex.error_message.as_deref(),
        );
        Ok(())
    }

    async fn load_codex(&self, codex_id: Uuid) -> Result<Codex> {
        self.store
            .get_codex(codex_id)
            .await?
            .ok_or_else(|| CodexError::codex_not_found(codex_id))
    }

    async fn cancellation_requested(&self, codex_id: Uuid) -> Result<bool> {
        Ok(self.load_codex(codex_id).await?.cancel_requested)
    }

    async fn settle_cancelled(&self, mut codex: Codex) -> Result<CodexOutcome> {
        let sections = self.store.list_sections(codex.codex_id).await?;
        let completed = count(&sections, SectionState::Completed);

        if matches!(codex.status, CodexState::NotStarted | CodexState::Generating) {
            codex.completed_sections = completed as i32;
            CodexStateMachine::apply(&mut codex, &CodexEvent::fail_with_error(CANCELLED_MESSAGE))?;
            self.store.update_codex(&codex).await?;
            log_codex_operation(
                "generation_cancelled",
                Some(codex.run_id),
                codex.codex_id,
                &codex.name,
                "failed",
                Some(CANCELLED_MESSAGE),
            );
        }

        Ok(CodexOutcome {
            codex_id: codex.codex_id,
            status: codex.status,
            total_sections: sections.len(),
            completed_sections: completed,
            errored_sections: count(&sections, SectionState::Error),
            cancelled: true,
        })
    }

    async fn fail_codex(&self, codex: &mut Codex, message: String) {
        if !matches!(codex.status, CodexState::NotStarted | CodexState::Generating) {
            return;
        }
        if let Err(e) = CodexStateMachine::apply(codex, &CodexEvent::Fail(message)) {
            warn!(error = %e, "Could not mark codex failed");
            return;
        }
        if let Err(e) = self.store.update_codex(codex).await {
            error!(codex_id = %codex.codex_id, error = %e, "Failed to persist codex failure");
        }
    }
}

enum SectionRun {
    Finished(SectionState),
    Cancelled,
}

fn count(sections: &[Section], status: SectionState) -> usize {
    sections.iter().filter(|s| s.status == status).count()
}
