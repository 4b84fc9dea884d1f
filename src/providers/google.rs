//! Google generative-language protocol: API key travels in the query string

use super::errors::ProviderError;
use super::protocol::{parse_json, WireProtocol};
use super::types::{join_url, ProviderCallRequest, ProviderConfig, WireCompletion, WireRequest};
use crate::models::TokenUsage;
use serde::Deserialize;
use serde_json::json;

pub struct GoogleGenerative;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl WireProtocol for GoogleGenerative {
    fn build_request(
        &self,
        config: &ProviderConfig,
        request: &ProviderCallRequest,
        max_tokens: u32,
    ) -> WireRequest {
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.user_prompt}]}],
            "generationConfig": {"maxOutputTokens": max_tokens},
        });
        if !request.system_prompt.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": request.system_prompt}]});
        }

        let path = format!("models/{}:generateContent", config.model);
        WireRequest {
            url: format!("{}?key={}", join_url(&config.base_url, &path), config.api_key),
            headers: Vec::new(),
            body,
        }
    }

    fn parse_response(
        &self,
        config: &ProviderConfig,
        body: &str,
    ) -> Result<WireCompletion, ProviderError> {
        let response: GenerateContentResponse = parse_json(config, body)?;

        let content: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::invalid_response(
                &config.provider_id,
                "response has no candidate text",
            ));
        }

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(WireCompletion { content, usage })
    }
}
