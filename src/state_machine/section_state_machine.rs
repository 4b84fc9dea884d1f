use super::errors::{StateMachineError, StateMachineResult};
use super::events::SectionEvent;
use super::states::SectionState;
use crate::models::Section;
use chrono::Utc;

/// Transition rules for sections
pub struct SectionStateMachine;

impl SectionStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: SectionState,
        event: &SectionEvent,
    ) -> StateMachineResult<SectionState> {
        let target = match (current_state, event) {
            // A section left `generating` by an interrupted attempt may be resumed
            (SectionState::Pending | SectionState::Generating, SectionEvent::Start) => {
                SectionState::Generating
            }
            (SectionState::Error, SectionEvent::Retry) => SectionState::Generating,
            (SectionState::Completed, SectionEvent::Regenerate) => SectionState::Generating,
            (SectionState::Generating, SectionEvent::Complete(_)) => SectionState::Completed,
            (SectionState::Pending | SectionState::Generating, SectionEvent::Fail(_)) => {
                SectionState::Error
            }
            (from_state, event) => {
                return Err(StateMachineError::invalid(
                    "section",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// The event that begins a new attempt from the section's current state
    pub fn begin_event(current_state: SectionState) -> SectionEvent {
        match current_state {
            SectionState::Error => SectionEvent::Retry,
            SectionState::Completed => SectionEvent::Regenerate,
            SectionState::Pending | SectionState::Generating => SectionEvent::Start,
        }
    }

    /// Apply an event to a section, updating content, error detail and counters
    pub fn apply(section: &mut Section, event: SectionEvent) -> StateMachineResult<SectionState> {
        let target = Self::determine_target_state(section.status, &event)?;

        match event {
            SectionEvent::Start => section.error_message = None,
            SectionEvent::Retry => {
                section.retry_count += 1;
                section.error_message = None;
            }
            SectionEvent::Regenerate => section.regeneration_count += 1,
            SectionEvent::Complete(content) => {
                section.content = Some(content);
                section.error_message = None;
            }
            SectionEvent::Fail(message) => section.error_message = Some(message),
        }

        section.status = target;
        section.updated_at = Utc::now();
        Ok(target)
    }
}
