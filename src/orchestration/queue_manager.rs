//! # Queue & Retry Manager
//!
//! Durable list of (subject, codex definition) generation requests.
//!
//! ```text
//! pending ──claim──► processing ──► completed | failed
//!    │                   │
//!    └──────cancel───────┴──► cancelled
//!
//! failed | cancelled ──retry──► pending
//! ```
//!
//! [`QueueManager`] owns the administrative operations; bulk variants
//! validate every selected item before writing any of them. Retried items
//! are handed to a [`QueueDispatcher`], which in production spawns a
//! [`QueueProcessor`] task per item.

use super::prerequisite_graph::transitive_closure;
use super::run_orchestrator::RunOrchestrator;
use crate::database::CodexStore;
use crate::error::{CodexError, Result};
use crate::logging::log_queue_operation;
use crate::models::{Codex, CodexDefinition, ExecutionConfig, ModelStep, NewQueueItem, NewRun, QueueItem, RunInput};
use crate::state_machine::{
    CodexEvent, CodexState, CodexStateMachine, QueueItemEvent, QueueItemState, QueueItemStateMachine,
    RunState,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Hands queue items to whatever processes them
#[async_trait]
pub trait QueueDispatcher: Send + Sync {
    async fn dispatch(&self, item_ids: Vec<Uuid>);
}

/// Spawns one processing task per dispatched item
pub struct SpawningDispatcher {
    processor: Arc<QueueProcessor>,
}

impl SpawningDispatcher {
    pub fn new(processor: Arc<QueueProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl QueueDispatcher for SpawningDispatcher {
    async fn dispatch(&self, item_ids: Vec<Uuid>) {
        for item_id in item_ids {
            let processor = self.processor.clone();
            tokio::spawn(async move {
                if let Err(e) = processor.process_item(item_id).await {
                    warn!(item_id = %item_id, error = %e, "Queue item processing failed");
                }
            });
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub subjects: Vec<String>,
    pub definition_ids: Vec<Uuid>,
    #[serde(default)]
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Cancel,
    Retry,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub action: BulkAction,
    pub item_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub affected: usize,
}

pub struct QueueManager {
    store: Arc<dyn CodexStore>,
    dispatcher: Arc<dyn QueueDispatcher>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn CodexStore>, dispatcher: Arc<dyn QueueDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn list(&self, status: Option<QueueItemState>) -> Result<Vec<QueueItem>> {
        self.store.list_queue_items(status).await
    }

    /// One pending item per (subject, definition) pair, dispatched immediately
    #[instrument(skip(self, request), fields(subjects = request.subjects.len(), definitions = request.definition_ids.len()))]
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<Vec<QueueItem>> {
        let subjects: Vec<&str> = request
            .subjects
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if subjects.is_empty() || request.definition_ids.is_empty() {
            return Err(CodexError::ValidationError(
                "enqueue requires at least one subject and one codex definition".to_string(),
            ));
        }
        if request.provider_id.is_some() != request.model.is_some() {
            return Err(CodexError::ValidationError(
                "provider and model must be assigned together".to_string(),
            ));
        }
        for definition_id in &request.definition_ids {
            if self.store.get_definition(*definition_id).await?.is_none() {
                return Err(CodexError::not_found("Codex definition", definition_id));
            }
        }
        if let Some(run_id) = request.run_id {
            if self.store.get_run(run_id).await?.is_none() {
                return Err(CodexError::run_not_found(run_id));
            }
        }

        let mut items = Vec::with_capacity(subjects.len() * request.definition_ids.len());
        for subject in &subjects {
            for definition_id in &request.definition_ids {
                items.push(QueueItem::from_new(NewQueueItem {
                    subject: subject.to_string(),
                    definition_id: *definition_id,
                    run_id: request.run_id,
                    provider_id: request.provider_id.clone(),
                    model: request.model.clone(),
                }));
            }
        }

        self.store.insert_queue_items(&items).await?;
        let ids = item_ids(&items);
        log_queue_operation("enqueue", &ids, "pending", None);
        self.dispatcher.dispatch(ids).await;
        Ok(items)
    }

    pub async fn cancel(&self, item_id: Uuid) -> Result<QueueItem> {
        let mut item = self.load(item_id).await?;
        QueueItemStateMachine::apply(&mut item, &QueueItemEvent::Cancel)?;
        self.store.update_queue_item(&item).await?;
        self.cancel_linked_codex(&item).await?;
        log_queue_operation("cancel", &[item_id], "cancelled", None);
        Ok(item)
    }

    pub async fn retry(&self, item_id: Uuid) -> Result<QueueItem> {
        let mut item = self.load(item_id).await?;
        QueueItemStateMachine::apply(&mut item, &QueueItemEvent::Retry)?;
        self.store.update_queue_item(&item).await?;
        log_queue_operation("retry", &[item_id], "pending", None);
        self.dispatcher.dispatch(vec![item_id]).await;
        Ok(item)
    }

    pub async fn delete(&self, item_id: Uuid) -> Result<()> {
        let item = self.load(item_id).await?;
        ensure_deletable(&item)?;
        self.store.delete_queue_items(&[item_id]).await?;
        log_queue_operation("delete", &[item_id], "deleted", None);
        Ok(())
    }

    /// Apply one action to every selected item, or to none of them
    #[instrument(skip(self, request), fields(action = ?request.action, items = request.item_ids.len()))]
    pub async fn bulk(&self, request: BulkRequest) -> Result<BulkOutcome> {
        if request.item_ids.is_empty() {
            return Ok(BulkOutcome {
                action: request.action,
                affected: 0,
            });
        }

        let mut items = self.store.get_queue_items(&request.item_ids).await?;
        if let Some(missing) = request
            .item_ids
            .iter()
            .find(|id| !items.iter().any(|item| item.item_id == **id))
        {
            return Err(CodexError::not_found("Queue item", missing));
        }

        let affected = items.len();
        let ids = item_ids(&items);
        match request.action {
            BulkAction::Delete => {
                for item in &items {
                    ensure_deletable(item)?;
                }
                self.store.delete_queue_items(&ids).await?;
                log_queue_operation("bulk_delete", &ids, "deleted", None);
            }
            BulkAction::Cancel | BulkAction::Retry => {
                let event = match request.action {
                    BulkAction::Cancel => QueueItemEvent::Cancel,
                    _ => QueueItemEvent::Retry,
                };
                for item in items.iter_mut() {
                    QueueItemStateMachine::apply(item, &event)?;
                }
                self.store.update_queue_items(&items).await?;
                log_queue_operation(
                    &format!("bulk_{}", event.event_type()),
                    &ids,
                    &items[0].status.to_string(),
                    None,
                );

                if request.action == BulkAction::Cancel {
                    for item in &items {
                        self.cancel_linked_codex(item).await?;
                    }
                } else {
                    self.dispatcher.dispatch(ids).await;
                }
            }
        }

        Ok(BulkOutcome {
            action: request.action,
            affected,
        })
    }

    /// Retry every failed item
    pub async fn retry_all_failed(&self) -> Result<BulkOutcome> {
        let failed = self.store.list_queue_items(Some(QueueItemState::Failed)).await?;
        info!(count = failed.len(), "Retrying all failed queue items");
        self.bulk(BulkRequest {
            action: BulkAction::Retry,
            item_ids: item_ids(&failed),
        })
        .await
    }

    async fn load(&self, item_id: Uuid) -> Result<QueueItem> {
        self.store
            .get_queue_item(item_id)
            .await?
            .ok_or_else(|| CodexError::not_found("Queue item", item_id))
    }

    /// Propagate cancellation to the codex the item is generating, if any
    async fn cancel_linked_codex(&self, item: &QueueItem) -> Result<()> {
        let Some(run_id) = item.run_id else {
            return Ok(());
        };
        let codexes = self.store.list_codexes(run_id).await?;
        if let Some(codex) = codexes
            .iter()
            .find(|c| c.definition_id == item.definition_id && !c.status.is_terminal())
        {
            self.store.request_codex_cancellation(codex.codex_id).await?;
            debug!(codex_id = %codex.codex_id, "Cancellation propagated to codex");
        }
        Ok(())
    }
}

fn ensure_deletable(item: &QueueItem) -> Result<()> {
    if item.status.can_delete() {
        Ok(())
    } else {
        Err(CodexError::ValidationError(format!(
            "queue item {} is {} and cannot be deleted",
            item.item_id, item.status
        )))
    }
}

fn item_ids(items: &[QueueItem]) -> Vec<Uuid> {
    items.iter().map(|item| item.item_id).collect()
}

/// Turns one queue item into orchestrated generation
pub struct QueueProcessor {
    store: Arc<dyn CodexStore>,
    orchestrator: Arc<RunOrchestrator>,
}

impl QueueProcessor {
    pub fn new(store: Arc<dyn CodexStore>, orchestrator: Arc<RunOrchestrator>) -> Self {
        Self { store, orchestrator }
    }

    /// Claim, orchestrate and settle one item
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn process_item(&self, item_id: Uuid) -> Result<QueueItem> {
        let mut item = self
            .store
            .get_queue_item(item_id)
            .await?
            .ok_or_else(|| CodexError::not_found("Queue item", item_id))?;
        if item.status != QueueItemState::Pending {
            debug!(status = %item.status, "Queue item no longer pending, skipping");
            return Ok(item);
        }

        QueueItemStateMachine::apply(&mut item, &QueueItemEvent::Claim)?;
        if !self.store.claim_queue_item(&item).await? {
            debug!("Queue item claimed elsewhere, skipping");
            return self
                .store
                .get_queue_item(item_id)
                .await?
                .ok_or_else(|| CodexError::not_found("Queue item", item_id));
        }
        log_queue_operation("claim", &[item_id], "processing", None);

        let outcome = match self.prepare(&mut item).await {
            Ok(codex_id) => self.generate(&item, codex_id).await,
            Err(e) => Err(e),
        };

        // An administrative cancel during generation wins
        let mut latest = self
            .store
            .get_queue_item(item_id)
            .await?
            .ok_or_else(|| CodexError::not_found("Queue item", item_id))?;
        if latest.status != QueueItemState::Processing {
            info!(status = %latest.status, "Queue item changed during processing, leaving as is");
            return Ok(latest);
        }
        latest.run_id = item.run_id;

        let event = match outcome {
            Ok(()) => QueueItemEvent::Complete,
            Err(e) => {
                error!(error = %e, "Queue item generation failed");
                QueueItemEvent::Fail(e.to_string())
            }
        };
        let status = QueueItemStateMachine::apply(&mut latest, &event)?;
        self.store.update_queue_item(&latest).await?;
        log_queue_operation("settle", &[item_id], &status.to_string(), latest.error_message.as_deref());
        Ok(latest)
    }

    /// Locate or create the run and codex the item generates; returns the codex id
    async fn prepare(&self, item: &mut QueueItem) -> Result<Uuid> {
        let definition = self
            .store
            .get_definition(item.definition_id)
            .await?
            .ok_or_else(|| CodexError::not_found("Codex definition", item.definition_id))?;

        match item.run_id {
            Some(run_id) => self.reuse_run(run_id, item, definition).await,
            None => {
                let definitions = self.store.list_definitions().await?;
                let mut closure = transitive_closure(&definitions, &definition);
                if let Some((provider, model)) = item.assigned_model() {
                    if let Some(root) = closure.iter_mut().find(|d| d.definition_id == definition.definition_id) {
                        root.execution = ExecutionConfig::Single {
                            step: ModelStep::new(provider, model),
                        };
                    }
                }

                let run = self
                    .orchestrator
                    .create_run_with_definitions(
                        NewRun {
                            subject: item.subject.clone(),
                            input: RunInput::default(),
                        },
                        closure,
                    )
                    .await?;
                item.run_id = Some(run.run_id);
                self.store.update_queue_item(item).await?;

                let codexes = self.store.list_codexes(run.run_id).await?;
                codexes
                    .iter()
                    .find(|c| c.definition_id == definition.definition_id)
                    .map(|c| c.codex_id)
                    .ok_or_else(|| CodexError::OrchestrationError("queued codex missing from its run".to_string()))
            }
        }
    }

    async fn reuse_run(&self, run_id: Uuid, item: &QueueItem, definition: CodexDefinition) -> Result<Uuid> {
        let run = self.orchestrator.reopen_run(run_id).await?;
        if run.cancel_requested {
            return Err(CodexError::ValidationError(format!(
                "run {run_id} is being cancelled"
            )));
        }

        let codexes = self.store.list_codexes(run_id).await?;
        match codexes.into_iter().find(|c| c.definition_id == item.definition_id) {
            Some(mut codex) => {
                if codex.cancel_requested {
                    self.store.clear_codex_cancellation(codex.codex_id).await?;
                }
                if codex.status.is_terminal() {
                    CodexStateMachine::apply(&mut codex, &CodexEvent::Reset)?;
                    self.store.update_codex(&codex).await?;
                }
                Ok(codex.codex_id)
            }
            None => {
                let codex = Codex::from_definition(run_id, definition);
                self.store.create_codex(&codex).await?;
                Ok(codex.codex_id)
            }
        }
    }

    async fn generate(&self, item: &QueueItem, codex_id: Uuid) -> Result<()> {
        let run_id = item
            .run_id
            .ok_or_else(|| CodexError::OrchestrationError("queue item has no run".to_string()))?;
        self.orchestrator.orchestrate_run(run_id).await?;

        let codex = self.await_codex(run_id, codex_id).await?;
        match codex.status {
            CodexState::Ready | CodexState::ReadyWithErrors => Ok(()),
            CodexState::Failed => Err(CodexError::OrchestrationError(
                codex
                    .error_message
                    .unwrap_or_else(|| format!("codex '{}' failed", codex.name)),
            )),
            other => Err(CodexError::OrchestrationError(format!(
                "codex '{}' ended {other}",
                codex.name
            ))),
        }
    }

    /// Wait for the codex to settle when another loop owns the run
    ///
    /// Polls with the dependency interval and attempt ceiling. A loop that
    /// finished before it saw the codex gets one more orchestration pass.
    async fn await_codex(&self, run_id: Uuid, codex_id: Uuid) -> Result<Codex> {
        let mut attempts = 0;
        let mut rerun = false;
        loop {
            let codex = self
                .store
                .get_codex(codex_id)
                .await?
                .ok_or_else(|| CodexError::codex_not_found(codex_id))?;
            if codex.status.is_terminal() {
                return Ok(codex);
            }

            if !self.orchestrator.is_orchestrating(run_id) {
                let run = self.orchestrator.run_status(run_id).await?;
                if rerun || !codex.has_sections() || run.cancel_requested || run.status != RunState::Completed {
                    return Ok(codex);
                }
                rerun = true;
                debug!(codex = %codex.name, "Run loop finished before the codex settled, orchestrating again");
                self.orchestrator.reopen_run(run_id).await?;
                self.orchestrator.orchestrate_run(run_id).await?;
                continue;
            }

            attempts += 1;
            if attempts > self.orchestrator.max_attempts() {
                return Err(CodexError::OrchestrationError(format!(
                    "timed out waiting for codex '{}' in run {run_id}",
                    codex.name
                )));
            }
            tokio::time::sleep(self.orchestrator.poll_interval()).await;
        }
    }
}
