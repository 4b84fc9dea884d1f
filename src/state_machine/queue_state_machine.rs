use super::errors::{StateMachineError, StateMachineResult};
use super::events::QueueItemEvent;
use super::states::QueueItemState;
use crate::models::QueueItem;
use chrono::Utc;

/// Transition rules for administrative queue items
pub struct QueueItemStateMachine;

impl QueueItemStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: QueueItemState,
        event: &QueueItemEvent,
    ) -> StateMachineResult<QueueItemState> {
        let target = match (current_state, event) {
            (QueueItemState::Pending, QueueItemEvent::Claim) => QueueItemState::Processing,
            (QueueItemState::Processing, QueueItemEvent::Complete) => QueueItemState::Completed,
            (QueueItemState::Pending | QueueItemState::Processing, QueueItemEvent::Fail(_)) => {
                QueueItemState::Failed
            }
            (QueueItemState::Pending | QueueItemState::Processing, QueueItemEvent::Cancel) => {
                QueueItemState::Cancelled
            }
            (
                QueueItemState::Pending | QueueItemState::Failed | QueueItemState::Cancelled,
                QueueItemEvent::Retry,
            ) => QueueItemState::Pending,
            (from_state, event) => {
                return Err(StateMachineError::invalid(
                    "queue item",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Apply an event to a queue item, maintaining timestamps and error detail
    pub fn apply(item: &mut QueueItem, event: &QueueItemEvent) -> StateMachineResult<QueueItemState> {
        let target = Self::determine_target_state(item.status, event)?;
        let now = Utc::now();

        match event {
            QueueItemEvent::Claim => item.started_at = Some(now),
            QueueItemEvent::Complete | QueueItemEvent::Cancel => item.completed_at = Some(now),
            QueueItemEvent::Fail(message) => {
                item.error_message = Some(message.clone());
                item.completed_at = Some(now);
            }
            QueueItemEvent::Retry => {
                item.error_message = None;
                item.started_at = None;
                item.completed_at = None;
            }
        }

        item.status = target;
        item.updated_at = now;
        Ok(target)
    }
}
