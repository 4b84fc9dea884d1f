//! Error types for the codex generation engine.

use crate::config::ConfigurationError;
use crate::providers::ProviderError;
use crate::state_machine::errors::StateMachineError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CodexError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(#[from] StateMachineError),
    #[error("Orchestration error: {0}")]
    OrchestrationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Circular prerequisite: '{prerequisite}' already depends on '{codex}'")]
    CircularDependency { codex: String, prerequisite: String },
    #[error("Notification error: {0}")]
    NotificationError(String),
}

impl CodexError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn run_not_found(run_id: Uuid) -> Self {
        Self::not_found("Run", run_id)
    }

    pub fn codex_not_found(codex_id: Uuid) -> Self {
        Self::not_found("Codex", codex_id)
    }

    /// True for errors that stem from definitions or provider setup rather than
    /// a transient failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationError(_) | Self::NotFound { .. } | Self::CircularDependency { .. }
        ) || matches!(self, Self::ProviderError(e) if e.is_configuration())
    }
}

impl From<serde_json::Error> for CodexError {
    fn from(error: serde_json::Error) -> Self {
        CodexError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for CodexError {
    fn from(err: sqlx::Error) -> Self {
        CodexError::DatabaseError(err.to_string())
    }
}

impl From<ConfigurationError> for CodexError {
    fn from(err: ConfigurationError) -> Self {
        CodexError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodexError>;
