//! Wire protocol seam
//!
//! A protocol translates the uniform call contract into one provider's HTTP
//! request shape and extracts content and token counts from its response.
//! Supporting a new provider family means adding one implementation here and
//! one arm in [`protocol_for`].

use super::anthropic::AnthropicMessages;
use super::errors::ProviderError;
use super::google::GoogleGenerative;
use super::openai::{OpenAiChat, OpenAiCompatible};
use super::types::{ProviderCallRequest, ProviderConfig, WireCompletion, WireRequest};
use crate::models::ProviderProtocol;

pub trait WireProtocol: Send + Sync {
    fn build_request(
        &self,
        config: &ProviderConfig,
        request: &ProviderCallRequest,
        max_tokens: u32,
    ) -> WireRequest;

    fn parse_response(
        &self,
        config: &ProviderConfig,
        body: &str,
    ) -> Result<WireCompletion, ProviderError>;
}

/// Attribution sent to OpenAI-compatible resellers
#[derive(Debug, Clone, Default)]
pub struct ResellerAttribution {
    pub referer: Option<String>,
    pub title: Option<String>,
}

/// Resolve the translator for a protocol
pub fn protocol_for(
    protocol: ProviderProtocol,
    attribution: &ResellerAttribution,
) -> Box<dyn WireProtocol> {
    match protocol {
        ProviderProtocol::OpenAiChat => Box::new(OpenAiChat),
        ProviderProtocol::AnthropicMessages => Box::new(AnthropicMessages),
        ProviderProtocol::GoogleGenerative => Box::new(GoogleGenerative),
        ProviderProtocol::OpenAiCompatible => Box::new(OpenAiCompatible {
            attribution: attribution.clone(),
        }),
    }
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    config: &ProviderConfig,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::invalid_response(&config.provider_id, e))
}
