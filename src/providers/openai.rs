//! OpenAI chat-completions protocol and OpenAI-compatible resellers
//!
//! Both authenticate with a bearer token and POST to `<base>/chat/completions`.
//! Resellers additionally receive attribution headers.

use super::errors::ProviderError;
use super::protocol::{parse_json, ResellerAttribution, WireProtocol};
use super::types::{join_url, ProviderCallRequest, ProviderConfig, WireCompletion, WireRequest};
use crate::models::TokenUsage;
use serde::Deserialize;
use serde_json::json;

pub struct OpenAiChat;

pub struct OpenAiCompatible {
    pub attribution: ResellerAttribution,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

fn chat_request(
    config: &ProviderConfig,
    request: &ProviderCallRequest,
    max_tokens: u32,
) -> WireRequest {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": request.system_prompt}));
    }
    messages.push(json!({"role": "user", "content": request.user_prompt}));

    WireRequest {
        url: join_url(&config.base_url, "chat/completions"),
        headers: vec![("authorization", format!("Bearer {}", config.api_key))],
        body: json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": max_tokens,
        }),
    }
}

fn parse_chat_response(
    config: &ProviderConfig,
    body: &str,
) -> Result<WireCompletion, ProviderError> {
    let response: ChatResponse = parse_json(config, body)?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ProviderError::invalid_response(&config.provider_id, "response has no content"))?;

    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(WireCompletion { content, usage })
}

impl WireProtocol for OpenAiChat {
    fn build_request(
        &self,
        config: &ProviderConfig,
        request: &ProviderCallRequest,
        max_tokens: u32,
    ) -> WireRequest {
        chat_request(config, request, max_tokens)
    }

    fn parse_response(
        &self,
        config: &ProviderConfig,
        body: &str,
    ) -> Result<WireCompletion, ProviderError> {
        parse_chat_response(config, body)
    }
}

impl WireProtocol for OpenAiCompatible {
    fn build_request(
        &self,
        config: &ProviderConfig,
        request: &ProviderCallRequest,
        max_tokens: u32,
    ) -> WireRequest {
        let mut wire = chat_request(config, request, max_tokens);
        if let Some(referer) = &self.attribution.referer {
            wire.headers.push(("http-referer", referer.clone()));
        }
        if let Some(title) = &self.attribution.title {
            wire.headers.push(("x-title", title.clone()));
        }
        wire
    }

    fn parse_response(
        &self,
        config: &ProviderConfig,
        body: &str,
    ) -> Result<WireCompletion, ProviderError> {
        parse_chat_response(config, body)
    }
}
