use super::errors::{StateMachineError, StateMachineResult};
use super::events::CodexEvent;
use super::states::CodexState;
use crate::models::Codex;
use chrono::Utc;

/// Transition rules for run-scoped codexes
pub struct CodexStateMachine;

impl CodexStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: CodexState,
        event: &CodexEvent,
    ) -> StateMachineResult<CodexState> {
        let target = match (current_state, event) {
            (CodexState::NotStarted, CodexEvent::Start) => CodexState::Generating,

            // Completion after a full pass, or a recompute after single-section regeneration
            (
                CodexState::Generating | CodexState::Ready | CodexState::ReadyWithErrors,
                CodexEvent::Complete {
                    errored_sections,
                    total_sections,
                },
            ) => Self::outcome(*errored_sections, *total_sections),

            (CodexState::NotStarted | CodexState::Generating, CodexEvent::Fail(_)) => {
                CodexState::Failed
            }

            (
                CodexState::Ready | CodexState::ReadyWithErrors | CodexState::Failed,
                CodexEvent::Reset,
            ) => CodexState::NotStarted,

            (from_state, event) => {
                return Err(StateMachineError::invalid(
                    "codex",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Outcome of a pass over all sections
    ///
    /// A codex where every section errored produced nothing, so it fails.
    pub fn outcome(errored_sections: usize, total_sections: usize) -> CodexState {
        if errored_sections == 0 {
            CodexState::Ready
        } else if errored_sections < total_sections {
            CodexState::ReadyWithErrors
        } else {
            CodexState::Failed
        }
    }

    /// Apply an event to a codex, maintaining its error message
    pub fn apply(codex: &mut Codex, event: &CodexEvent) -> StateMachineResult<CodexState> {
        let target = Self::determine_target_state(codex.status, event)?;

        match event {
            CodexEvent::Fail(message) => codex.error_message = Some(message.clone()),
            CodexEvent::Complete {
                errored_sections,
                total_sections,
            } => {
                codex.error_message = match target {
                    CodexState::Ready => None,
                    _ => Some(format!(
                        "{errored_sections} of {total_sections} sections failed"
                    )),
                };
            }
            CodexEvent::Reset => {
                codex.error_message = None;
                codex.cancel_requested = false;
            }
            CodexEvent::Start => codex.error_message = None,
        }

        codex.status = target;
        codex.updated_at = Utc::now();
        Ok(target)
    }
}
