use super::errors::{StateMachineError, StateMachineResult};
use super::events::RunEvent;
use super::states::RunState;
use crate::models::Run;
use chrono::Utc;

/// Transition rules for runs
pub struct RunStateMachine;

impl RunStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: RunState,
        event: &RunEvent,
    ) -> StateMachineResult<RunState> {
        let target = match (current_state, event) {
            (RunState::Pending, RunEvent::Start) => RunState::Generating,
            (RunState::Generating, RunEvent::Complete) => RunState::Completed,
            (RunState::Pending | RunState::Generating, RunEvent::Cancel) => RunState::Cancelled,
            (RunState::Completed | RunState::Cancelled, RunEvent::Reopen) => RunState::Pending,
            (from_state, event) => {
                return Err(StateMachineError::invalid(
                    "run",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Apply an event to a run, updating timestamps and flags
    pub fn apply(run: &mut Run, event: &RunEvent) -> StateMachineResult<RunState> {
        let target = Self::determine_target_state(run.status, event)?;
        let now = Utc::now();

        match event {
            RunEvent::Complete | RunEvent::Cancel => run.completed_at = Some(now),
            RunEvent::Reopen => {
                run.completed_at = None;
                run.cancel_requested = false;
            }
            RunEvent::Start => {}
        }

        run.status = target;
        run.updated_at = now;
        Ok(target)
    }
}
