//! Injected per-model price table.
//!
//! Keys are either `"<provider>/<model>"` or a bare `"<model>"`; the
//! provider-qualified entry wins. Unknown models cost nothing.

use crate::config::ModelPricing;
use crate::models::TokenUsage;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    rates: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new(rates: HashMap<String, ModelPricing>) -> Self {
        Self { rates }
    }

    pub fn rate_for(&self, provider: &str, model: &str) -> Option<ModelPricing> {
        self.rates
            .get(&format!("{provider}/{model}"))
            .or_else(|| self.rates.get(model))
            .copied()
    }

    /// Cost in USD: `(prompt / 1e6) * input_rate + (completion / 1e6) * output_rate`
    pub fn cost(&self, provider: &str, model: &str, usage: &TokenUsage) -> f64 {
        self.rate_for(provider, model)
            .map(|rate| compute_cost(usage, rate))
            .unwrap_or(0.0)
    }
}

pub fn compute_cost(usage: &TokenUsage, rate: ModelPricing) -> f64 {
    (usage.prompt_tokens as f64 / 1_000_000.0) * rate.input_per_million
        + (usage.completion_tokens as f64 / 1_000_000.0) * rate.output_per_million
}
