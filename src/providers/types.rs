use crate::models::{ProviderProtocol, TokenUsage};
use serde::Serialize;
use std::fmt;

/// Everything needed to reach one provider with one model
#[derive(Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub provider_name: String,
    pub protocol: ProviderProtocol,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("provider_name", &self.provider_name)
            .field("protocol", &self.protocol)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCallRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: Option<u32>,
}

impl ProviderCallRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Normalized result of one successful provider call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Provider that actually served the call, which may differ from the requested one
    pub provider: String,
    pub model: String,
}

/// Protocol-specific HTTP request produced by a translator
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

/// Content and token counts extracted from a 2xx response body
#[derive(Debug, Clone, PartialEq)]
pub struct WireCompletion {
    pub content: String,
    pub usage: TokenUsage,
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
