//! # Execution Mode Engine
//!
//! Produces one section's text from its codex's [`ExecutionConfig`]:
//!
//! - `single`: one provider call.
//! - `parallel_merge`: every generation step is issued concurrently; the
//!   merge step then synthesizes the successful outputs. Failed generators
//!   are dropped from the merge prompt, and when none succeed the merge is
//!   skipped and the section fails.
//! - `sequential_chain`: steps run strictly in order, each consuming the
//!   previous step's output; the first failure halts the chain.
//!
//! Every underlying call, successful or not, is written to the usage ledger.

use super::errors::ExecutionError;
use super::prompts::{chain_step_prompt, merge_prompt};
use crate::constants::usage_functions;
use crate::models::{ChainStep, ExecutionConfig, ModelStep, TokenUsage, UsageStatus};
use crate::providers::{
    ProviderCallRequest, ProviderError, ProviderGateway, ProviderResolver, ProviderResponse,
};
use crate::usage::{UsageEntry, UsageLedger};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Run and codex a call is attributed to
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    pub run_id: Option<Uuid>,
    pub codex_id: Option<Uuid>,
}

/// One underlying provider call
#[derive(Debug, Clone, PartialEq)]
pub struct CallUsage {
    pub function_name: &'static str,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Final artifact of one execution plus the usage of each successful call
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub content: String,
    pub usage: Vec<CallUsage>,
}

pub struct ExecutionModeEngine {
    gateway: Arc<dyn ProviderGateway>,
    resolver: Arc<ProviderResolver>,
    ledger: Arc<UsageLedger>,
    max_tokens: Option<u32>,
}

impl ExecutionModeEngine {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        resolver: Arc<ProviderResolver>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            gateway,
            resolver,
            ledger,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[instrument(skip_all, fields(mode = config.kind(), codex_id = ?context.codex_id))]
    pub async fn execute(
        &self,
        config: &ExecutionConfig,
        system_prompt: &str,
        user_prompt: &str,
        context: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        match config {
            ExecutionConfig::Single { step } => {
                let response = self
                    .call_step(
                        step,
                        system_prompt,
                        user_prompt,
                        usage_functions::GENERATE_SECTION,
                        context,
                    )
                    .await?;
                Ok(ExecutionOutput {
                    usage: vec![call_usage(usage_functions::GENERATE_SECTION, &response)],
                    content: response.content,
                })
            }
            ExecutionConfig::ParallelMerge {
                generators,
                merge,
                merge_instruction,
            } => {
                self.parallel_merge(
                    generators,
                    merge,
                    merge_instruction,
                    system_prompt,
                    user_prompt,
                    context,
                )
                .await
            }
            ExecutionConfig::SequentialChain { steps } => {
                self.sequential_chain(steps, system_prompt, user_prompt, context)
                    .await
            }
        }
    }

    async fn parallel_merge(
        &self,
        generators: &[ModelStep],
        merge: &ModelStep,
        merge_instruction: &str,
        system_prompt: &str,
        user_prompt: &str,
        context: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        if generators.is_empty() {
            return Err(ExecutionError::InvalidConfiguration(
                "parallel_merge requires at least one generation step".to_string(),
            ));
        }

        let results = join_all(generators.iter().map(|step| {
            self.call_step(
                step,
                system_prompt,
                user_prompt,
                usage_functions::PARALLEL_GENERATION,
                context,
            )
        }))
        .await;

        let mut successes = Vec::new();
        let mut errors = Vec::new();
        for (step, result) in generators.iter().zip(results) {
            match result {
                Ok(response) => successes.push(response),
                Err(e) => {
                    warn!(
                        provider = %step.provider_id,
                        model = %step.model,
                        error = %e,
                        "Parallel generation step failed"
                    );
                    errors.push(format!("{}({}): {e}", step.provider_id, step.model));
                }
            }
        }

        if successes.is_empty() {
            return Err(ExecutionError::AllGeneratorsFailed {
                attempted: generators.len(),
                errors,
            });
        }

        debug!(
            succeeded = successes.len(),
            failed = errors.len(),
            "Merging parallel generation results"
        );

        let prompt = merge_prompt(
            merge_instruction,
            successes
                .iter()
                .map(|r| (r.provider.as_str(), r.model.as_str(), r.content.as_str())),
        );
        let merged = self
            .call_step(
                merge,
                system_prompt,
                &prompt,
                usage_functions::MERGE_RESULTS,
                context,
            )
            .await?;

        let mut usage: Vec<CallUsage> = successes
            .iter()
            .map(|r| call_usage(usage_functions::PARALLEL_GENERATION, r))
            .collect();
        usage.push(call_usage(usage_functions::MERGE_RESULTS, &merged));

        Ok(ExecutionOutput {
            content: merged.content,
            usage,
        })
    }

    async fn sequential_chain(
        &self,
        steps: &[ChainStep],
        system_prompt: &str,
        user_prompt: &str,
        context: ExecutionContext,
    ) -> Result<ExecutionOutput, ExecutionError> {
        if steps.is_empty() {
            return Err(ExecutionError::InvalidConfiguration(
                "sequential_chain requires at least one step".to_string(),
            ));
        }

        let total = steps.len();
        let mut current = user_prompt.to_string();
        let mut usage = Vec::with_capacity(total);

        for (index, chain_step) in steps.iter().enumerate() {
            let prompt = chain_step_prompt(chain_step.instruction.as_deref(), &current);
            let response = self
                .call_step(
                    &chain_step.step,
                    system_prompt,
                    &prompt,
                    usage_functions::CHAIN_STEP,
                    context,
                )
                .await
                .map_err(|source| ExecutionError::ChainStepFailed {
                    step: index + 1,
                    total,
                    source,
                })?;

            usage.push(call_usage(usage_functions::CHAIN_STEP, &response));
            current = response.content;
        }

        Ok(ExecutionOutput {
            content: current,
            usage,
        })
    }

    /// Resolve, call and record one step
    async fn call_step(
        &self,
        step: &ModelStep,
        system_prompt: &str,
        user_prompt: &str,
        function_name: &'static str,
        context: ExecutionContext,
    ) -> Result<ProviderResponse, ProviderError> {
        let config = self.resolver.resolve(&step.provider_id, &step.model).await?;

        let mut request = ProviderCallRequest::new(system_prompt, user_prompt);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let result = self.gateway.call(&request, &config).await;

        let (usage, status, error_message) = match &result {
            Ok(response) => (response.usage, UsageStatus::Success, None),
            Err(e) => (TokenUsage::default(), UsageStatus::Error, Some(e.to_string())),
        };
        self.ledger
            .log(UsageEntry {
                run_id: context.run_id,
                codex_id: context.codex_id,
                function_name,
                provider: &config.provider_id,
                model: &config.model,
                usage,
                status,
                error_message: error_message.as_deref(),
            })
            .await;

        result
    }
}

fn call_usage(function_name: &'static str, response: &ProviderResponse) -> CallUsage {
    CallUsage {
        function_name,
        provider: response.provider.clone(),
        model: response.model.clone(),
        usage: response.usage,
    }
}
