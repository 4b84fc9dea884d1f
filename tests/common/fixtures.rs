//! Builders for definitions, provider registries and a fully wired engine.

use super::fakes::{RecordingNotifier, ScriptedGateway};
use codex_core::config::CodexConfig;
use codex_core::database::{CodexStore, InMemoryStore};
use codex_core::models::{
    ChainStep, CodexDefinition, ExecutionConfig, ModelStep, ProviderCredential, ProviderProtocol,
    ProviderRecord,
};
use codex_core::providers::ProviderResolver;
use codex_core::web::state::AppState;
use std::sync::Arc;

/// Defaults with millisecond polling so dependency waits stay fast
pub fn test_config() -> CodexConfig {
    let mut config = CodexConfig::default();
    config.environment = "test".to_string();
    config.orchestration.dependency_poll_interval_ms = 10;
    config.orchestration.dependency_max_attempts = 5;
    config
}

pub fn single(provider: &str, model: &str) -> ExecutionConfig {
    ExecutionConfig::Single {
        step: ModelStep::new(provider, model),
    }
}

pub fn parallel_merge(generators: &[(&str, &str)], merge: (&str, &str)) -> ExecutionConfig {
    ExecutionConfig::ParallelMerge {
        generators: generators
            .iter()
            .map(|(provider, model)| ModelStep::new(*provider, *model))
            .collect(),
        merge: ModelStep::new(merge.0, merge.1),
        merge_instruction: "Combine the drafts into one section".to_string(),
    }
}

pub fn sequential_chain(steps: &[(&str, &str, Option<&str>)]) -> ExecutionConfig {
    ExecutionConfig::SequentialChain {
        steps: steps
            .iter()
            .map(|(provider, model, instruction)| ChainStep {
                step: ModelStep::new(*provider, *model),
                instruction: instruction.map(str::to_string),
            })
            .collect(),
    }
}

/// Definition named `name` with sections `<name> 1..=sections`
pub fn definition(name: &str, sections: usize, prerequisites: &[&str]) -> CodexDefinition {
    CodexDefinition::new(name, single("openai", "gpt-4o"))
        .with_sections((1..=sections).map(|i| format!("{name} {i}")))
        .with_prerequisites(prerequisites.iter().copied())
}

fn provider(id: &str, protocol: ProviderProtocol, model: &str, priority: i32) -> ProviderRecord {
    ProviderRecord {
        provider_id: id.to_string(),
        name: id.to_uppercase(),
        protocol,
        base_url: format!("https://{id}.example/v1"),
        default_model: model.to_string(),
        priority,
        is_active: true,
    }
}

/// openai (priority 1), anthropic (2) and google (3), all with active credentials
pub async fn seed_providers(store: &dyn CodexStore) {
    for record in [
        provider("openai", ProviderProtocol::OpenAiChat, "gpt-4o", 1),
        provider("anthropic", ProviderProtocol::AnthropicMessages, "claude-sonnet", 2),
        provider("google", ProviderProtocol::GoogleGenerative, "gemini-pro", 3),
    ] {
        store.upsert_credential(&ProviderCredential {
            provider_id: record.provider_id.clone(),
            api_key: format!("{}-key", record.provider_id),
            is_active: true,
        })
        .await
        .unwrap();
        store.upsert_provider(&record).await.unwrap();
    }
}

pub async fn save_definitions(store: &dyn CodexStore, definitions: &[CodexDefinition]) {
    for (order, definition) in definitions.iter().enumerate() {
        store
            .save_definition(&definition.clone().with_display_order(order as i32))
            .await
            .unwrap();
    }
}

/// Engine wired over the in-memory store and scripted gateway
pub struct TestEngine {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

impl TestEngine {
    pub async fn new(gateway: ScriptedGateway) -> Self {
        Self::with_parts(gateway, RecordingNotifier::default(), test_config()).await
    }

    pub async fn with_parts(
        gateway: ScriptedGateway,
        notifier: RecordingNotifier,
        config: CodexConfig,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        seed_providers(store.as_ref()).await;

        let gateway = Arc::new(gateway);
        let notifier = Arc::new(notifier);
        let dyn_store: Arc<dyn CodexStore> = store.clone();
        let resolver = ProviderResolver::new(dyn_store.clone(), config.providers.default_provider.clone())
            .with_key_source(|_| Some("default-key".to_string()));
        let state = AppState::build(dyn_store, gateway.clone(), resolver, notifier.clone(), &config);

        Self {
            store,
            gateway,
            notifier,
            state,
        }
    }

    pub fn store(&self) -> &dyn CodexStore {
        self.store.as_ref()
    }
}
