//! # Usage Ledger
//!
//! Append-only record of every provider call. Logging never fails the
//! caller: store errors are reported through `tracing` and dropped.

use super::pricing::PricingTable;
use crate::database::CodexStore;
use crate::models::{TokenUsage, UsageRecord, UsageStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// One provider call to be recorded
#[derive(Debug, Clone)]
pub struct UsageEntry<'a> {
    pub run_id: Option<Uuid>,
    pub codex_id: Option<Uuid>,
    pub function_name: &'a str,
    pub provider: &'a str,
    pub model: &'a str,
    pub usage: TokenUsage,
    pub status: UsageStatus,
    pub error_message: Option<&'a str>,
}

pub struct UsageLedger {
    store: Arc<dyn CodexStore>,
    pricing: PricingTable,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn CodexStore>, pricing: PricingTable) -> Self {
        Self { store, pricing }
    }

    pub fn build_record(&self, entry: &UsageEntry<'_>) -> UsageRecord {
        UsageRecord {
            usage_id: Uuid::new_v4(),
            run_id: entry.run_id,
            codex_id: entry.codex_id,
            function_name: entry.function_name.to_string(),
            provider: entry.provider.to_string(),
            model: entry.model.to_string(),
            prompt_tokens: entry.usage.prompt_tokens as i64,
            completion_tokens: entry.usage.completion_tokens as i64,
            total_tokens: entry.usage.total_tokens as i64,
            cost_usd: self.pricing.cost(entry.provider, entry.model, &entry.usage),
            status: entry.status,
            error_message: entry.error_message.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    pub async fn log(&self, entry: UsageEntry<'_>) {
        let record = self.build_record(&entry);
        if let Err(e) = self.store.insert_usage_record(&record).await {
            error!(
                error = %e,
                function = %record.function_name,
                provider = %record.provider,
                model = %record.model,
                run_id = ?record.run_id,
                codex_id = ?record.codex_id,
                "Failed to record provider usage"
            );
        }
    }
}
