//! Queue item transitions, bulk actions and processing into runs.

use crate::common::fakes::{RecordingDispatcher, RecordingNotifier, ScriptedGateway};
use crate::common::fixtures::{definition, save_definitions, test_config, TestEngine};
use codex_core::models::{CodexDefinition, QueueItem};
use codex_core::orchestration::{
    BulkAction, BulkRequest, EnqueueRequest, QueueManager, QueueProcessor,
};
use codex_core::state_machine::{CodexState, QueueItemState, RunState};
use codex_core::CodexError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct QueueHarness {
    engine: TestEngine,
    dispatcher: Arc<RecordingDispatcher>,
    manager: QueueManager,
    processor: QueueProcessor,
    definitions: Vec<CodexDefinition>,
}

async fn harness(gateway: ScriptedGateway) -> QueueHarness {
    harness_over(TestEngine::new(gateway).await).await
}

async fn harness_over(engine: TestEngine) -> QueueHarness {
    save_definitions(
        engine.store(),
        &[
            definition("Profile", 2, &[]),
            definition("Forecast", 1, &["Profile"]),
            definition("Unrelated", 1, &[]),
        ],
    )
    .await;
    let definitions = engine.store().list_definitions().await.unwrap();

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let manager = QueueManager::new(engine.state.store.clone(), dispatcher.clone());
    let processor = QueueProcessor::new(engine.state.store.clone(), engine.state.orchestrator.clone());

    QueueHarness {
        engine,
        dispatcher,
        manager,
        processor,
        definitions,
    }
}

impl QueueHarness {
    fn definition_id(&self, name: &str) -> Uuid {
        self.definitions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.definition_id)
            .unwrap()
    }

    async fn enqueue_one(&self, subject: &str, name: &str) -> QueueItem {
        self.manager
            .enqueue(EnqueueRequest {
                subjects: vec![subject.to_string()],
                definition_ids: vec![self.definition_id(name)],
                run_id: None,
                provider_id: None,
                model: None,
            })
            .await
            .unwrap()
            .remove(0)
    }

    async fn status(&self, item_id: Uuid) -> QueueItemState {
        self.engine
            .store()
            .get_queue_item(item_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

#[tokio::test]
async fn test_enqueue_creates_one_item_per_pair_and_dispatches() {
    let h = harness(ScriptedGateway::new()).await;

    let items = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string(), "  ".to_string(), "Grace".to_string()],
            definition_ids: vec![h.definition_id("Profile"), h.definition_id("Unrelated")],
            run_id: None,
            provider_id: None,
            model: None,
        })
        .await
        .unwrap();

    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|i| i.status == QueueItemState::Pending));
    let mut dispatched = h.dispatcher.dispatched();
    let mut ids: Vec<Uuid> = items.iter().map(|i| i.item_id).collect();
    dispatched.sort();
    ids.sort();
    assert_eq!(dispatched, ids);

    let pending = h.manager.list(Some(QueueItemState::Pending)).await.unwrap();
    assert_eq!(pending.len(), 4);
}

#[tokio::test]
async fn test_enqueue_validation() {
    let h = harness(ScriptedGateway::new()).await;

    let no_subjects = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec![" ".to_string()],
            definition_ids: vec![h.definition_id("Profile")],
            run_id: None,
            provider_id: None,
            model: None,
        })
        .await;
    assert!(matches!(no_subjects, Err(CodexError::ValidationError(_))));

    let half_assigned = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![h.definition_id("Profile")],
            run_id: None,
            provider_id: Some("anthropic".to_string()),
            model: None,
        })
        .await;
    assert!(matches!(half_assigned, Err(CodexError::ValidationError(_))));

    let unknown = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![Uuid::new_v4()],
            run_id: None,
            provider_id: None,
            model: None,
        })
        .await;
    assert!(matches!(unknown, Err(CodexError::NotFound { .. })));

    assert!(h.manager.list(None).await.unwrap().is_empty());
    assert!(h.dispatcher.dispatched().is_empty());
}

#[tokio::test]
async fn test_processing_generates_codex_with_its_prerequisites() {
    let h = harness(ScriptedGateway::new()).await;
    let item = h.enqueue_one("Ada", "Forecast").await;

    let settled = h.processor.process_item(item.item_id).await.unwrap();

    assert_eq!(settled.status, QueueItemState::Completed);
    assert!(settled.started_at.is_some());
    assert!(settled.completed_at.is_some());
    let run_id = settled.run_id.unwrap();

    let summary = h.engine.state.orchestrator.run_status(run_id).await.unwrap();
    assert_eq!(summary.status, RunState::Completed);
    assert_eq!(summary.codexes.len(), 2);
    assert_eq!(summary.codex("Profile").unwrap().status, CodexState::Ready);
    assert_eq!(summary.codex("Forecast").unwrap().status, CodexState::Ready);
    assert!(summary.codex("Unrelated").is_none());

    // Settled items are not reprocessed
    let again = h.processor.process_item(item.item_id).await.unwrap();
    assert_eq!(again.status, QueueItemState::Completed);
    assert_eq!(h.engine.gateway.call_count(), 3);
}

#[tokio::test]
async fn test_model_assignment_overrides_queued_codex_only() {
    let h = harness(ScriptedGateway::new()).await;
    let item = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![h.definition_id("Forecast")],
            run_id: None,
            provider_id: Some("anthropic".to_string()),
            model: Some("claude-opus".to_string()),
        })
        .await
        .unwrap()
        .remove(0);

    h.processor.process_item(item.item_id).await.unwrap();

    let forecast_calls = h.engine.gateway.calls_containing("\"Forecast\" codex");
    assert_eq!(forecast_calls.len(), 1);
    assert_eq!(forecast_calls[0].provider, "anthropic");
    assert_eq!(forecast_calls[0].model, "claude-opus");
    assert!(h
        .engine
        .gateway
        .calls_containing("\"Profile\" codex")
        .iter()
        .all(|c| c.provider == "openai"));
}

#[tokio::test]
async fn test_failed_generation_fails_item_and_retry_recovers() {
    let h = harness(ScriptedGateway::new().fail_provider("openai")).await;
    let item = h.enqueue_one("Ada", "Unrelated").await;

    let settled = h.processor.process_item(item.item_id).await.unwrap();
    assert_eq!(settled.status, QueueItemState::Failed);
    assert!(settled.error_message.is_some());

    let retried = h.manager.retry(item.item_id).await.unwrap();
    assert_eq!(retried.status, QueueItemState::Pending);
    assert!(retried.error_message.is_none());
    assert_eq!(h.dispatcher.dispatched().len(), 2);
}

#[tokio::test]
async fn test_retry_reuses_linked_run_and_resets_codex() {
    let engine_gateway = ScriptedGateway::new().fail_when_prompt_contains("\"Unrelated\" codex");
    let h = harness(engine_gateway).await;
    let item = h.enqueue_one("Ada", "Unrelated").await;

    let settled = h.processor.process_item(item.item_id).await.unwrap();
    assert_eq!(settled.status, QueueItemState::Failed);
    let run_id = settled.run_id.unwrap();

    h.manager.retry(item.item_id).await.unwrap();
    let second = h.processor.process_item(item.item_id).await.unwrap();

    // Same run, codex reset and regenerated (and failing again)
    assert_eq!(second.run_id, Some(run_id));
    assert_eq!(second.status, QueueItemState::Failed);
    assert_eq!(h.engine.gateway.calls_containing("\"Unrelated\" codex").len(), 2);
    let codexes = h.engine.store().list_codexes(run_id).await.unwrap();
    assert_eq!(codexes.len(), 1);
}

#[tokio::test]
async fn test_transition_rules() {
    let h = harness(ScriptedGateway::new()).await;

    // Pending: cancellable and retryable, not deletable
    let pending = h.enqueue_one("Ada", "Unrelated").await;
    assert!(h.manager.delete(pending.item_id).await.is_err());
    assert_eq!(
        h.manager.retry(pending.item_id).await.unwrap().status,
        QueueItemState::Pending
    );
    assert_eq!(
        h.manager.cancel(pending.item_id).await.unwrap().status,
        QueueItemState::Cancelled
    );
    h.manager.delete(pending.item_id).await.unwrap();
    assert!(h.engine.store().get_queue_item(pending.item_id).await.unwrap().is_none());

    // Completed: terminal for cancel and retry, deletable
    let done = h.enqueue_one("Grace", "Unrelated").await;
    h.processor.process_item(done.item_id).await.unwrap();
    assert!(matches!(
        h.manager.cancel(done.item_id).await,
        Err(CodexError::StateTransitionError(_))
    ));
    assert!(h.manager.retry(done.item_id).await.is_err());
    assert_eq!(h.status(done.item_id).await, QueueItemState::Completed);
    h.manager.delete(done.item_id).await.unwrap();

    assert!(matches!(
        h.manager.cancel(Uuid::new_v4()).await,
        Err(CodexError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_bulk_actions_are_all_or_nothing() {
    let h = harness(ScriptedGateway::new()).await;
    let first = h.enqueue_one("Ada", "Unrelated").await;
    let second = h.enqueue_one("Grace", "Unrelated").await;
    let done = h.enqueue_one("Alan", "Unrelated").await;
    h.processor.process_item(done.item_id).await.unwrap();

    // One completed item blocks the whole cancel
    let result = h
        .manager
        .bulk(BulkRequest {
            action: BulkAction::Cancel,
            item_ids: vec![first.item_id, second.item_id, done.item_id],
        })
        .await;
    assert!(result.is_err());
    assert_eq!(h.status(first.item_id).await, QueueItemState::Pending);
    assert_eq!(h.status(second.item_id).await, QueueItemState::Pending);

    // Pending items cannot be bulk deleted alongside a completed one
    assert!(h
        .manager
        .bulk(BulkRequest {
            action: BulkAction::Delete,
            item_ids: vec![first.item_id, done.item_id],
        })
        .await
        .is_err());
    assert_eq!(h.manager.list(None).await.unwrap().len(), 3);

    let outcome = h
        .manager
        .bulk(BulkRequest {
            action: BulkAction::Cancel,
            item_ids: vec![first.item_id, second.item_id],
        })
        .await
        .unwrap();
    assert_eq!(outcome.affected, 2);
    assert_eq!(h.status(second.item_id).await, QueueItemState::Cancelled);

    let outcome = h
        .manager
        .bulk(BulkRequest {
            action: BulkAction::Delete,
            item_ids: vec![first.item_id, second.item_id, done.item_id],
        })
        .await
        .unwrap();
    assert_eq!(outcome.affected, 3);
    assert!(h.manager.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_all_failed_only_touches_failed_items() {
    let h = harness(ScriptedGateway::new().fail_when_prompt_contains("\"Unrelated\" codex")).await;
    let failing = h.enqueue_one("Ada", "Unrelated").await;
    let passing = h.enqueue_one("Ada", "Profile").await;
    h.processor.process_item(failing.item_id).await.unwrap();
    h.processor.process_item(passing.item_id).await.unwrap();
    let dispatched_before = h.dispatcher.dispatched().len();

    let outcome = h.manager.retry_all_failed().await.unwrap();

    assert_eq!(outcome.affected, 1);
    assert_eq!(outcome.action, BulkAction::Retry);
    assert_eq!(h.status(failing.item_id).await, QueueItemState::Pending);
    assert_eq!(h.status(passing.item_id).await, QueueItemState::Completed);
    assert_eq!(h.dispatcher.dispatched().len(), dispatched_before + 1);
}

#[tokio::test]
async fn test_cancel_propagates_to_linked_codex() {
    let h = harness(ScriptedGateway::new()).await;
    let item = h.enqueue_one("Ada", "Unrelated").await;

    // Link the item to a run whose codex has not finished
    let run = h
        .engine
        .state
        .orchestrator
        .create_run_with_definitions(
            codex_core::models::NewRun {
                subject: "Ada".to_string(),
                input: Default::default(),
            },
            vec![h
                .definitions
                .iter()
                .find(|d| d.name == "Unrelated")
                .cloned()
                .unwrap()],
        )
        .await
        .unwrap();
    let mut linked = h.engine.store().get_queue_item(item.item_id).await.unwrap().unwrap();
    linked.run_id = Some(run.run_id);
    h.engine.store().update_queue_item(&linked).await.unwrap();

    h.manager.cancel(item.item_id).await.unwrap();

    let codex = h.engine.store().list_codexes(run.run_id).await.unwrap().remove(0);
    assert!(codex.cancel_requested);
}

#[tokio::test]
async fn test_concurrent_processing_of_one_item_generates_once() {
    let h = harness(ScriptedGateway::new().with_delay(Duration::from_millis(20))).await;
    let item = h.enqueue_one("Ada", "Unrelated").await;

    let (first, second) = tokio::join!(
        h.processor.process_item(item.item_id),
        h.processor.process_item(item.item_id)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let settled = h.engine.store().get_queue_item(item.item_id).await.unwrap().unwrap();
    assert_eq!(settled.status, QueueItemState::Completed);
    assert!(first.run_id.is_some() || second.run_id.is_some());
    assert_eq!(h.engine.gateway.calls_containing("\"Unrelated\" codex").len(), 1);
}

#[tokio::test]
async fn test_items_sharing_a_run_settle_once_their_codex_finishes() {
    let mut config = test_config();
    config.orchestration.dependency_max_attempts = 200;
    let engine = TestEngine::with_parts(
        ScriptedGateway::new().with_delay(Duration::from_millis(50)),
        RecordingNotifier::default(),
        config,
    )
    .await;
    let h = harness_over(engine).await;

    let seed = h.enqueue_one("Ada", "Profile").await;
    let run_id = h.processor.process_item(seed.item_id).await.unwrap().run_id.unwrap();

    let items = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![h.definition_id("Profile"), h.definition_id("Unrelated")],
            run_id: Some(run_id),
            provider_id: None,
            model: None,
        })
        .await
        .unwrap();

    // One of the two finds the run already being orchestrated by the other
    let (profile, unrelated) = tokio::join!(
        h.processor.process_item(items[0].item_id),
        h.processor.process_item(items[1].item_id)
    );
    let (profile, unrelated) = (profile.unwrap(), unrelated.unwrap());

    assert_eq!(profile.status, QueueItemState::Completed, "{:?}", profile.error_message);
    assert_eq!(unrelated.status, QueueItemState::Completed, "{:?}", unrelated.error_message);

    let summary = h.engine.state.orchestrator.run_status(run_id).await.unwrap();
    assert_eq!(summary.status, RunState::Completed);
    assert_eq!(summary.codex("Profile").unwrap().status, CodexState::Ready);
    assert_eq!(summary.codex("Unrelated").unwrap().status, CodexState::Ready);
}

#[tokio::test]
async fn test_reprocessing_a_codex_keeps_sibling_cancellations() {
    let h = harness(ScriptedGateway::new()).await;
    let profile = h.enqueue_one("Ada", "Profile").await;
    let run_id = h.processor.process_item(profile.item_id).await.unwrap().run_id.unwrap();

    // A queued sibling in the same run, cancelled from the queue
    let sibling_item = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![h.definition_id("Unrelated")],
            run_id: Some(run_id),
            provider_id: None,
            model: None,
        })
        .await
        .unwrap()
        .remove(0);
    let definition = h
        .definitions
        .iter()
        .find(|d| d.name == "Unrelated")
        .cloned()
        .unwrap();
    let sibling = codex_core::models::Codex::from_definition(run_id, definition);
    h.engine.store().create_codex(&sibling).await.unwrap();
    h.manager.cancel(sibling_item.item_id).await.unwrap();

    // Profile carries a stale flag of its own
    let profile_codex = h
        .engine
        .store()
        .list_codexes(run_id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.name == "Profile")
        .unwrap();
    h.engine
        .store()
        .request_codex_cancellation(profile_codex.codex_id)
        .await
        .unwrap();

    let requeued = h
        .manager
        .enqueue(EnqueueRequest {
            subjects: vec!["Ada".to_string()],
            definition_ids: vec![h.definition_id("Profile")],
            run_id: Some(run_id),
            provider_id: None,
            model: None,
        })
        .await
        .unwrap()
        .remove(0);
    let settled = h.processor.process_item(requeued.item_id).await.unwrap();

    assert_eq!(settled.status, QueueItemState::Completed, "{:?}", settled.error_message);
    let sibling = h.engine.store().get_codex(sibling.codex_id).await.unwrap().unwrap();
    assert!(sibling.cancel_requested);
    assert_eq!(sibling.status, CodexState::Failed);
    assert!(h.engine.gateway.calls_containing("\"Unrelated\" codex").is_empty());
}
