//! # Provider Resolution
//!
//! Turns a requested `(provider, model)` pair into a callable
//! [`ProviderConfig`] with a three-tier fallback:
//!
//! 1. the requested provider and model, when the provider is active and has
//!    an active credential;
//! 2. the highest-priority active provider with an active credential, using
//!    its default model (lower `priority` values win);
//! 3. the default provider from process configuration, keyed from an
//!    environment variable.
//!
//! A misconfigured or disabled provider therefore degrades model choice
//! instead of failing generation. Each fallback is logged.

use super::errors::ProviderError;
use super::types::ProviderConfig;
use crate::config::DefaultProviderConfig;
use crate::database::CodexStore;
use crate::models::{ProviderCredential, ProviderRecord};
use std::sync::Arc;
use tracing::{debug, warn};

type KeySource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Which tier produced a resolved configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Requested,
    Priority,
    Default,
}

#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub config: ProviderConfig,
    pub tier: ResolutionTier,
}

pub struct ProviderResolver {
    store: Arc<dyn CodexStore>,
    default_provider: DefaultProviderConfig,
    key_source: KeySource,
}

impl ProviderResolver {
    pub fn new(store: Arc<dyn CodexStore>, default_provider: DefaultProviderConfig) -> Self {
        Self {
            store,
            default_provider,
            key_source: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the environment lookup used for the default provider's key
    pub fn with_key_source<F>(mut self, key_source: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.key_source = Arc::new(key_source);
        self
    }

    pub async fn resolve(
        &self,
        requested_provider_id: &str,
        requested_model: &str,
    ) -> Result<ProviderConfig, ProviderError> {
        self.resolve_with_tier(requested_provider_id, requested_model)
            .await
            .map(|resolved| resolved.config)
    }

    pub async fn resolve_with_tier(
        &self,
        requested_provider_id: &str,
        requested_model: &str,
    ) -> Result<ResolvedProvider, ProviderError> {
        // Registry read failures degrade to the configured default
        let providers = match self.store.list_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                warn!(error = %e, "Failed to read provider registry, using default provider");
                Vec::new()
            }
        };

        if let Some(provider) = providers
            .iter()
            .find(|p| p.provider_id == requested_provider_id && p.is_active)
        {
            if let Some(credential) = self.active_credential(&provider.provider_id).await {
                debug!(
                    provider = %provider.provider_id,
                    model = %requested_model,
                    "Resolved requested provider"
                );
                return Ok(ResolvedProvider {
                    config: Self::build_config(provider, &credential, requested_model),
                    tier: ResolutionTier::Requested,
                });
            }
        }

        warn!(
            requested_provider = %requested_provider_id,
            requested_model = %requested_model,
            "Requested provider unavailable, falling back to highest-priority provider"
        );

        let mut candidates: Vec<&ProviderRecord> = providers.iter().filter(|p| p.is_active).collect();
        candidates.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });

        for provider in candidates {
            if let Some(credential) = self.active_credential(&provider.provider_id).await {
                warn!(
                    requested_provider = %requested_provider_id,
                    fallback_provider = %provider.provider_id,
                    fallback_model = %provider.default_model,
                    "Using priority fallback provider"
                );
                return Ok(ResolvedProvider {
                    config: Self::build_config(provider, &credential, &provider.default_model),
                    tier: ResolutionTier::Priority,
                });
            }
        }

        let fallback = &self.default_provider;
        let api_key = (self.key_source)(&fallback.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NoProviderAvailable(format!(
                    "no active credential for '{requested_provider_id}', no active fallback provider, and {} is not set",
                    fallback.api_key_env
                ))
            })?;

        warn!(
            requested_provider = %requested_provider_id,
            default_provider = %fallback.provider_id,
            default_model = %fallback.model,
            "Using configured default provider"
        );

        Ok(ResolvedProvider {
            config: ProviderConfig {
                provider_id: fallback.provider_id.clone(),
                provider_name: fallback.name.clone(),
                protocol: fallback.protocol,
                base_url: fallback.base_url.clone(),
                api_key,
                model: fallback.model.clone(),
            },
            tier: ResolutionTier::Default,
        })
    }

    async fn active_credential(&self, provider_id: &str) -> Option<ProviderCredential> {
        match self.store.get_credential(provider_id).await {
            Ok(credential) => credential.filter(|c| c.is_active && !c.api_key.is_empty()),
            Err(e) => {
                warn!(provider = %provider_id, error = %e, "Failed to read provider credential");
                None
            }
        }
    }

    fn build_config(
        provider: &ProviderRecord,
        credential: &ProviderCredential,
        model: &str,
    ) -> ProviderConfig {
        ProviderConfig {
            provider_id: provider.provider_id.clone(),
            provider_name: provider.name.clone(),
            protocol: provider.protocol,
            base_url: provider.base_url.clone(),
            api_key: credential.api_key.clone(),
            model: model.to_string(),
        }
    }
}
