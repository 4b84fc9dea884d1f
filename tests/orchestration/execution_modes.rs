//! Execution mode engine against the scripted gateway.

use crate::common::fakes::ScriptedGateway;
use crate::common::fixtures::{parallel_merge, seed_providers, sequential_chain, single};
use codex_core::config::ModelPricing;
use codex_core::constants::usage_functions;
use codex_core::database::{CodexStore, InMemoryStore};
use codex_core::models::UsageStatus;
use codex_core::orchestration::{ExecutionContext, ExecutionError, ExecutionModeEngine};
use codex_core::providers::ProviderResolver;
use codex_core::usage::{PricingTable, UsageLedger};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    engine: ExecutionModeEngine,
    gateway: Arc<ScriptedGateway>,
    store: Arc<InMemoryStore>,
    context: ExecutionContext,
}

async fn harness(gateway: ScriptedGateway) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    seed_providers(store.as_ref()).await;
    let dyn_store: Arc<dyn CodexStore> = store.clone();

    let pricing = PricingTable::new(HashMap::from([(
        "gpt-4o".to_string(),
        ModelPricing {
            input_per_million: 2.0,
            output_per_million: 8.0,
        },
    )]));
    let ledger = Arc::new(UsageLedger::new(dyn_store.clone(), pricing));
    let resolver = Arc::new(
        ProviderResolver::new(dyn_store, Default::default()).with_key_source(|_| None),
    );
    let gateway = Arc::new(gateway);

    Harness {
        engine: ExecutionModeEngine::new(gateway.clone(), resolver, ledger),
        gateway,
        store,
        context: ExecutionContext {
            run_id: Some(Uuid::new_v4()),
            codex_id: Some(Uuid::new_v4()),
        },
    }
}

impl Harness {
    async fn usage(&self) -> Vec<codex_core::models::UsageRecord> {
        self.store
            .list_usage_records(self.context.run_id.unwrap())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_single_mode_makes_one_call_and_logs_cost() {
    let h = harness(ScriptedGateway::new()).await;

    let output = h
        .engine
        .execute(&single("openai", "gpt-4o"), "system", "write it", h.context)
        .await
        .unwrap();

    assert_eq!(output.content, "content from openai(gpt-4o)");
    assert_eq!(output.usage.len(), 1);
    assert_eq!(output.usage[0].function_name, usage_functions::GENERATE_SECTION);

    let usage = h.usage().await;
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].status, UsageStatus::Success);
    // 100 prompt @ 2.0 + 50 completion @ 8.0 per million
    assert!((usage[0].cost_usd - 0.0006).abs() < 1e-12);
}

#[tokio::test]
async fn test_parallel_merge_drops_failed_generator() {
    let h = harness(ScriptedGateway::new().fail_provider("anthropic")).await;
    let config = parallel_merge(
        &[("openai", "gpt-4o"), ("anthropic", "claude-sonnet")],
        ("google", "gemini-pro"),
    );

    let output = h
        .engine
        .execute(&config, "system", "write it", h.context)
        .await
        .unwrap();

    assert_eq!(output.content, "content from google(gemini-pro)");

    let merge_calls: Vec<_> = h
        .gateway
        .calls()
        .into_iter()
        .filter(|c| c.provider == "google")
        .collect();
    assert_eq!(merge_calls.len(), 1);
    let merge_prompt = &merge_calls[0].user_prompt;
    assert!(merge_prompt.starts_with("Combine the drafts into one section"));
    assert!(merge_prompt.contains("=== RESULT FROM openai(gpt-4o) ===\ncontent from openai(gpt-4o)"));
    assert!(!merge_prompt.contains("RESULT FROM anthropic"));

    let usage = h.usage().await;
    assert_eq!(usage.len(), 3);
    let failed: Vec<_> = usage
        .iter()
        .filter(|r| r.status == UsageStatus::Error)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].provider, "anthropic");
    assert_eq!(failed[0].function_name, usage_functions::PARALLEL_GENERATION);
    assert!(usage
        .iter()
        .any(|r| r.function_name == usage_functions::MERGE_RESULTS));
}

#[tokio::test]
async fn test_parallel_merge_skips_merge_when_all_generators_fail() {
    let h = harness(
        ScriptedGateway::new()
            .fail_provider("openai")
            .fail_provider("anthropic"),
    )
    .await;
    let config = parallel_merge(
        &[("openai", "gpt-4o"), ("anthropic", "claude-sonnet")],
        ("google", "gemini-pro"),
    );

    let err = h
        .engine
        .execute(&config, "system", "write it", h.context)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::AllGeneratorsFailed { attempted: 2, .. }));
    assert!(err.to_string().contains("503"));
    assert!(h.gateway.calls().iter().all(|c| c.provider != "google"));
}

#[tokio::test]
async fn test_sequential_chain_feeds_each_output_forward() {
    let h = harness(ScriptedGateway::new()).await;
    let config = sequential_chain(&[
        ("openai", "gpt-4o", None),
        ("anthropic", "claude-sonnet", Some("Polish this")),
    ]);

    let output = h
        .engine
        .execute(&config, "system", "draft it", h.context)
        .await
        .unwrap();

    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].user_prompt, "draft it");
    assert_eq!(calls[1].user_prompt, "Polish this\n\ncontent from openai(gpt-4o)");
    assert_eq!(output.content, "content from anthropic(claude-sonnet)");
    assert!(output
        .usage
        .iter()
        .all(|u| u.function_name == usage_functions::CHAIN_STEP));
}

#[tokio::test]
async fn test_sequential_chain_halts_on_first_failure() {
    let h = harness(ScriptedGateway::new().fail_provider("anthropic")).await;
    let config = sequential_chain(&[
        ("openai", "gpt-4o", None),
        ("anthropic", "claude-sonnet", None),
        ("google", "gemini-pro", None),
    ]);

    let err = h
        .engine
        .execute(&config, "system", "draft it", h.context)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::ChainStepFailed { step: 2, total: 3, .. }));
    assert!(h.gateway.calls().iter().all(|c| c.provider != "google"));
}

#[tokio::test]
async fn test_usage_write_failures_never_fail_generation() {
    let h = harness(ScriptedGateway::new()).await;
    h.store.set_fail_usage_writes(true);

    let output = h
        .engine
        .execute(&single("openai", "gpt-4o"), "system", "write it", h.context)
        .await
        .unwrap();

    assert!(!output.content.is_empty());
    assert_eq!(h.store.usage_record_count(), 0);
}
