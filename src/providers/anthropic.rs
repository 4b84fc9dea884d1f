//! Anthropic Messages protocol: `x-api-key` header authentication

use super::errors::ProviderError;
use super::protocol::{parse_json, WireProtocol};
use super::types::{join_url, ProviderCallRequest, ProviderConfig, WireCompletion, WireRequest};
use crate::models::TokenUsage;
use serde::Deserialize;
use serde_json::json;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicMessages;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl WireProtocol for AnthropicMessages {
    fn build_request(
        &self,
        config: &ProviderConfig,
        request: &ProviderCallRequest,
        max_tokens: u32,
    ) -> WireRequest {
        let mut body = json!({
            "model": config.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": request.user_prompt}],
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }

        WireRequest {
            url: join_url(&config.base_url, "messages"),
            headers: vec![
                ("x-api-key", config.api_key.clone()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            body,
        }
    }

    fn parse_response(
        &self,
        config: &ProviderConfig,
        body: &str,
    ) -> Result<WireCompletion, ProviderError> {
        let response: MessagesResponse = parse_json(config, body)?;

        let content: String = response
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(ProviderError::invalid_response(
                &config.provider_id,
                "response missing text content",
            ));
        }

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(WireCompletion { content, usage })
    }
}
