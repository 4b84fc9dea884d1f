//! # Web API Application State
//!
//! Shared handles to the engine components, wired once at startup.

use crate::config::{CodexConfig, WebConfig};
use crate::database::CodexStore;
use crate::orchestration::{
    CompletionNotifier, ExecutionModeEngine, QueueManager, QueueProcessor, RunOrchestrator,
    SectionBatchExecutor, SpawningDispatcher,
};
use crate::providers::{ProviderGateway, ProviderResolver};
use crate::services::DefinitionService;
use crate::usage::{PricingTable, UsageLedger};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CodexStore>,
    pub orchestrator: Arc<RunOrchestrator>,
    pub queue: Arc<QueueManager>,
    pub definitions: Arc<DefinitionService>,
    pub web_config: Arc<WebConfig>,
}

impl AppState {
    /// Wire the engine: ledger and resolver feed the execution engine, which
    /// feeds the section executor, run orchestrator and queue processor
    pub fn build(
        store: Arc<dyn CodexStore>,
        gateway: Arc<dyn ProviderGateway>,
        resolver: ProviderResolver,
        notifier: Arc<dyn CompletionNotifier>,
        config: &CodexConfig,
    ) -> Self {
        let ledger = Arc::new(UsageLedger::new(
            store.clone(),
            PricingTable::new(config.pricing.clone()),
        ));
        let engine = Arc::new(ExecutionModeEngine::new(gateway, Arc::new(resolver), ledger));
        let executor = Arc::new(SectionBatchExecutor::new(
            store.clone(),
            engine,
            config.orchestration.section_batch_size,
        ));
        let orchestrator = Arc::new(RunOrchestrator::new(
            store.clone(),
            executor,
            notifier,
            &config.orchestration,
        ));
        let processor = Arc::new(QueueProcessor::new(store.clone(), orchestrator.clone()));
        let queue = Arc::new(QueueManager::new(
            store.clone(),
            Arc::new(SpawningDispatcher::new(processor)),
        ));

        info!(
            section_batch_size = config.orchestration.section_batch_size,
            dependency_max_attempts = config.orchestration.dependency_max_attempts,
            "Codex engine wired"
        );

        Self {
            definitions: Arc::new(DefinitionService::new(store.clone())),
            store,
            orchestrator,
            queue,
            web_config: Arc::new(config.web.clone()),
        }
    }

    /// Run orchestration on a background task; outcomes land in status rows
    pub fn spawn_orchestration(&self, run_id: uuid::Uuid) {
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.orchestrate_run(run_id).await {
                tracing::error!(run_id = %run_id, error = %e, "Background orchestration failed");
            }
        });
    }
}
