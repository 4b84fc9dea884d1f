use crate::error::CodexError;
use crate::providers::ProviderError;
use thiserror::Error;

/// Failures of one execution-mode run for one section
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("All {attempted} parallel generation steps failed: {}", .errors.join("; "))]
    AllGeneratorsFailed {
        attempted: usize,
        errors: Vec<String>,
    },

    #[error("Chain step {step} of {total} failed: {source}")]
    ChainStepFailed {
        step: usize,
        total: usize,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid execution configuration: {0}")]
    InvalidConfiguration(String),
}

impl ExecutionError {
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Provider(e) | Self::ChainStepFailed { source: e, .. } => e.is_configuration(),
            Self::InvalidConfiguration(_) => true,
            Self::AllGeneratorsFailed { .. } => false,
        }
    }
}

impl From<ExecutionError> for CodexError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Provider(e) => CodexError::ProviderError(e),
            ExecutionError::InvalidConfiguration(message) => CodexError::ConfigurationError(message),
            other => CodexError::OrchestrationError(other.to_string()),
        }
    }
}
