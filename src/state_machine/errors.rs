use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid {entity} transition from {from} on event '{event}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StateMachineError {
    pub fn invalid(entity: &'static str, from: impl ToString, event: &'static str) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            event,
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
