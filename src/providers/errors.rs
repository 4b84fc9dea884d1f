use thiserror::Error;

/// Failures raised by the provider gateway and resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Non-2xx response; the raw body is preserved for the section error message
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Transport error calling {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("No provider available: {0}")]
    NoProviderAvailable(String),
}

impl ProviderError {
    pub fn transport(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Setup problems that an explicit retry will not fix
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NoProviderAvailable(_))
    }

    /// Failures that may succeed on an administrative retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport { .. })
    }
}
