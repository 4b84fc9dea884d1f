//! # Configuration
//!
//! Typed configuration for the generation engine, loaded from
//! `config/codex.yaml` with an optional `config/environments/<env>.yaml`
//! overlay and a small set of environment variable overrides.
//!
//! Every section has a `Default` so partial YAML files deserialize cleanly.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{
    DEFAULT_DEPENDENCY_MAX_ATTEMPTS, DEFAULT_DEPENDENCY_POLL_INTERVAL, DEFAULT_MAX_TOKENS,
    DEFAULT_PROVIDER_TIMEOUT, DEFAULT_SECTION_BATCH_SIZE,
};
use crate::models::ProviderProtocol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodexConfig {
    pub environment: String,
    pub database: DatabaseConfig,
    pub orchestration: OrchestrationConfig,
    pub providers: ProvidersConfig,
    /// Price table keyed by `"<provider>/<model>"` or `"<model>"`
    pub pricing: HashMap<String, ModelPricing>,
    pub notification: NotificationConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

/// Knobs for the orchestration loop and section batching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub section_batch_size: usize,
    pub dependency_poll_interval_ms: u64,
    pub dependency_max_attempts: u32,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            section_batch_size: DEFAULT_SECTION_BATCH_SIZE,
            dependency_poll_interval_ms: DEFAULT_DEPENDENCY_POLL_INTERVAL.as_millis() as u64,
            dependency_max_attempts: DEFAULT_DEPENDENCY_MAX_ATTEMPTS,
        }
    }
}

impl OrchestrationConfig {
    pub fn dependency_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dependency_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub request_timeout_seconds: u64,
    pub max_tokens: u32,
    /// Attribution sent to OpenAI-compatible resellers that ask for it
    pub referer: Option<String>,
    pub app_title: Option<String>,
    pub default_provider: DefaultProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: DEFAULT_PROVIDER_TIMEOUT.as_secs(),
            max_tokens: DEFAULT_MAX_TOKENS,
            referer: None,
            app_title: Some("codex-core".to_string()),
            default_provider: DefaultProviderConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Last-resort provider used when the registry yields nothing usable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultProviderConfig {
    pub provider_id: String,
    pub name: String,
    pub protocol: ProviderProtocol,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for DefaultProviderConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            name: "OpenAI".to_string(),
            protocol: ProviderProtocol::OpenAiChat,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub cors_allow_any_origin: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_allow_any_origin: true,
        }
    }
}

impl CodexConfig {
    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.orchestration.section_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.section_batch_size",
                "0",
                "batch size must be at least 1",
            ));
        }

        if self.orchestration.dependency_max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.dependency_max_attempts",
                "0",
                "at least one readiness check is required",
            ));
        }

        let default_provider = &self.providers.default_provider;
        if default_provider.provider_id.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "provider_id",
                "providers.default_provider",
            ));
        }
        if default_provider.model.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "model",
                "providers.default_provider",
            ));
        }
        if default_provider.base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "base_url",
                "providers.default_provider",
            ));
        }

        for (key, price) in &self.pricing {
            if price.input_per_million < 0.0 || price.output_per_million < 0.0 {
                return Err(ConfigurationError::invalid_value(
                    format!("pricing.{key}"),
                    format!("{}/{}", price.input_per_million, price.output_per_million),
                    "rates cannot be negative",
                ));
            }
        }

        Ok(())
    }

    pub fn is_test_environment(&self) -> bool {
        self.environment == "test"
    }
}
