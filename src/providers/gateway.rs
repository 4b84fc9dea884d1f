//! # Provider Gateway
//!
//! Uniform `call` over heterogeneous text-generation HTTP APIs. The gateway
//! performs exactly one HTTP exchange per call: any non-2xx response becomes
//! [`ProviderError::Http`] with the raw body preserved, and retry policy is
//! left to callers.

use super::errors::ProviderError;
use super::protocol::{protocol_for, ResellerAttribution};
use super::types::{ProviderCallRequest, ProviderConfig, ProviderResponse};
use crate::config::ProvidersConfig;
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn call(
        &self,
        request: &ProviderCallRequest,
        config: &ProviderConfig,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// `reqwest`-backed gateway
pub struct HttpProviderGateway {
    client: reqwest::Client,
    default_max_tokens: u32,
    attribution: ResellerAttribution,
}

impl HttpProviderGateway {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            default_max_tokens: config.max_tokens,
            attribution: ResellerAttribution {
                referer: config.referer.clone(),
                title: config.app_title.clone(),
            },
        })
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn call(
        &self,
        request: &ProviderCallRequest,
        config: &ProviderConfig,
    ) -> Result<ProviderResponse, ProviderError> {
        let protocol = protocol_for(config.protocol, &self.attribution);
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);
        let wire = protocol.build_request(config, request, max_tokens);

        debug!(
            provider = %config.provider_id,
            model = %config.model,
            protocol = %config.protocol,
            max_tokens = max_tokens,
            "Invoking provider"
        );

        let started = Instant::now();
        let mut builder = self.client.post(&wire.url).json(&wire.body);
        for (name, value) in &wire.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                // Strip the URL: query-keyed protocols carry the credential in it
                e.without_url().to_string()
            };
            ProviderError::transport(&config.provider_id, message)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(&config.provider_id, e.without_url()))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: config.provider_id.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let completion = protocol.parse_response(config, &body)?;

        debug!(
            provider = %config.provider_id,
            model = %config.model,
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider call completed"
        );

        Ok(ProviderResponse {
            content: completion.content,
            usage: completion.usage,
            provider: config.provider_id.clone(),
            model: config.model.clone(),
        })
    }
}
