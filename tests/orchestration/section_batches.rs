//! Section batch execution and single-section regeneration.

use crate::common::fakes::ScriptedGateway;
use crate::common::fixtures::{definition, TestEngine};
use codex_core::models::{Codex, NewRun, RunInput};
use codex_core::orchestration::{CodexGenerationInput, SectionRequest};
use codex_core::state_machine::{CodexState, SectionState};
use std::sync::Arc;

async fn codex_for(engine: &TestEngine, name: &str, sections: usize) -> Codex {
    let run = engine
        .state
        .orchestrator
        .create_run_with_definitions(
            NewRun {
                subject: "Ada Lovelace".to_string(),
                input: RunInput::default(),
            },
            vec![definition(name, sections, &[])],
        )
        .await
        .unwrap();
    engine
        .store()
        .list_codexes(run.run_id)
        .await
        .unwrap()
        .into_iter()
        .next()
        .unwrap()
}

fn input() -> CodexGenerationInput {
    CodexGenerationInput {
        subject: "Ada Lovelace".to_string(),
        input_context: String::new(),
        prerequisite_content: None,
    }
}

#[tokio::test]
async fn test_section_initialization_is_idempotent_under_concurrency() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let codex = codex_for(&engine, "Profile", 4).await;
    let executor = Arc::clone(engine.state.orchestrator.executor());

    let (first, second) = tokio::join!(
        executor.initialize_sections(&codex),
        executor.initialize_sections(&codex)
    );
    assert_eq!(first.unwrap().len(), 4);
    assert_eq!(second.unwrap().len(), 4);

    let third = executor.initialize_sections(&codex).await.unwrap();
    let indexes: Vec<i32> = third.iter().map(|s| s.section_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
    assert_eq!(engine.store().list_sections(codex.codex_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_partial_failure_settles_ready_with_errors() {
    let engine = TestEngine::new(ScriptedGateway::new().fail_when_prompt_contains("section 3 of 5")).await;
    let codex = codex_for(&engine, "Profile", 5).await;

    let outcome = engine
        .state
        .orchestrator
        .executor()
        .execute_codex(codex.codex_id, &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, CodexState::ReadyWithErrors);
    assert_eq!(outcome.total_sections, 5);
    assert_eq!(outcome.completed_sections, 4);
    assert_eq!(outcome.errored_sections, 1);

    let sections = engine.store().list_sections(codex.codex_id).await.unwrap();
    let errored: Vec<_> = sections.iter().filter(|s| s.status == SectionState::Error).collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].section_index, 2);
    assert!(errored[0].error_message.as_deref().unwrap().contains("500"));

    let stored = engine.store().get_codex(codex.codex_id).await.unwrap().unwrap();
    assert_eq!(stored.completed_sections, 4);
}

#[tokio::test]
async fn test_all_sections_failing_fails_codex() {
    let engine = TestEngine::new(ScriptedGateway::new().fail_provider("openai")).await;
    let codex = codex_for(&engine, "Profile", 2).await;

    let outcome = engine
        .state
        .orchestrator
        .executor()
        .execute_codex(codex.codex_id, &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, CodexState::Failed);
    assert_eq!(outcome.completed_sections, 0);
}

#[tokio::test]
async fn test_every_section_is_generated_across_batches() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let batch_size = engine.state.orchestrator.executor().batch_size();
    let total = batch_size * 2 + 1;
    let codex = codex_for(&engine, "Profile", total).await;

    let outcome = engine
        .state
        .orchestrator
        .executor()
        .execute_codex(codex.codex_id, &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, CodexState::Ready);
    assert_eq!(outcome.completed_sections, total);
    assert_eq!(engine.gateway.call_count(), total);
    for index in 1..=total {
        let marker = format!("section {index} of {total}");
        assert_eq!(engine.gateway.calls_containing(&marker).len(), 1, "{marker}");
    }
}

#[tokio::test]
async fn test_finished_codex_cannot_be_executed_again() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let codex = codex_for(&engine, "Profile", 1).await;
    let executor = engine.state.orchestrator.executor();

    executor.execute_codex(codex.codex_id, &input()).await.unwrap();
    let err = executor.execute_codex(codex.codex_id, &input()).await.unwrap_err();

    assert!(err.to_string().contains("cannot be generated"));
    assert_eq!(engine.gateway.call_count(), 1);
}

#[tokio::test]
async fn test_single_section_retry_recovers_codex() {
    let engine = TestEngine::new(ScriptedGateway::new().fail_when_prompt_contains("section 2 of 2")).await;
    let codex = codex_for(&engine, "Profile", 2).await;
    let executor = engine.state.orchestrator.executor();

    let outcome = executor.execute_codex(codex.codex_id, &input()).await.unwrap();
    assert_eq!(outcome.status, CodexState::ReadyWithErrors);

    // Regenerate a completed section: counters move, status is recomputed
    let request = SectionRequest {
        codex_id: codex.codex_id,
        codex_name: "Profile".to_string(),
        section_index: 0,
        input_context: String::new(),
        prerequisite_content: Some("extra reference".to_string()),
    };
    let section = executor
        .generate_single_section(&request, "Ada Lovelace")
        .await
        .unwrap();
    assert_eq!(section.status, SectionState::Completed);
    assert_eq!(section.regeneration_count, 1);

    let stored = engine.store().get_codex(codex.codex_id).await.unwrap().unwrap();
    assert_eq!(stored.status, CodexState::ReadyWithErrors);
    assert_eq!(stored.completed_sections, 1);
    assert!(engine
        .gateway
        .calls_containing("Reference material:\nextra reference")
        .len()
        == 1);
}

#[tokio::test]
async fn test_single_section_rejects_mismatched_name_and_index() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let codex = codex_for(&engine, "Profile", 2).await;
    let executor = engine.state.orchestrator.executor();

    let mut request = SectionRequest {
        codex_id: codex.codex_id,
        codex_name: "Other".to_string(),
        section_index: 0,
        input_context: String::new(),
        prerequisite_content: None,
    };
    assert!(executor.generate_single_section(&request, "Ada").await.is_err());

    request.codex_name = "Profile".to_string();
    request.section_index = 2;
    let err = executor.generate_single_section(&request, "Ada").await.unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert_eq!(engine.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_single_section_on_fresh_codex_keeps_it_startable() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let codex = codex_for(&engine, "Profile", 2).await;
    let executor = engine.state.orchestrator.executor();

    let request = SectionRequest {
        codex_id: codex.codex_id,
        codex_name: "Profile".to_string(),
        section_index: 1,
        input_context: String::new(),
        prerequisite_content: None,
    };
    executor.generate_single_section(&request, "Ada").await.unwrap();

    let stored = engine.store().get_codex(codex.codex_id).await.unwrap().unwrap();
    assert_eq!(stored.status, CodexState::NotStarted);
    assert_eq!(stored.completed_sections, 1);
    assert!(stored.error_message.is_none());

    // Generating the remaining section settles the codex
    let request = SectionRequest {
        section_index: 0,
        ..request
    };
    executor.generate_single_section(&request, "Ada").await.unwrap();
    let stored = engine.store().get_codex(codex.codex_id).await.unwrap().unwrap();
    assert_eq!(stored.status, CodexState::Ready);
    assert_eq!(stored.completed_sections, 2);
}

#[tokio::test]
async fn test_single_section_waits_for_prerequisites_and_orchestration_finishes_codex() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let orchestrator = &engine.state.orchestrator;
    let run = orchestrator
        .create_run_with_definitions(
            NewRun {
                subject: "Ada Lovelace".to_string(),
                input: RunInput::default(),
            },
            vec![definition("Base", 1, &[]), definition("Child", 2, &["Base"])],
        )
        .await
        .unwrap();
    let codexes = engine.store().list_codexes(run.run_id).await.unwrap();
    let child = codexes.iter().find(|c| c.name == "Child").unwrap().clone();
    let executor = orchestrator.executor();

    let request = SectionRequest {
        codex_id: child.codex_id,
        codex_name: "Child".to_string(),
        section_index: 0,
        input_context: String::new(),
        prerequisite_content: None,
    };
    let err = executor.generate_single_section(&request, "Ada Lovelace").await.unwrap_err();
    assert!(matches!(err, codex_core::CodexError::ValidationError(_)));
    assert!(err.to_string().contains("Base"));
    assert_eq!(engine.gateway.call_count(), 0);

    let summary = orchestrator.orchestrate_run(run.run_id).await.unwrap();
    assert_eq!(summary.codex("Base").unwrap().status, CodexState::Ready);
    assert_eq!(summary.codex("Child").unwrap().status, CodexState::Ready);
    assert_eq!(summary.codex("Child").unwrap().completed_sections, 2);
    assert_eq!(engine.gateway.call_count(), 3);
}

#[tokio::test]
async fn test_partially_generated_codex_is_completed_by_its_run() {
    let engine = TestEngine::new(ScriptedGateway::new()).await;
    let orchestrator = &engine.state.orchestrator;
    let run = orchestrator
        .create_run_with_definitions(
            NewRun {
                subject: "Ada Lovelace".to_string(),
                input: RunInput::default(),
            },
            vec![definition("Child", 2, &[])],
        )
        .await
        .unwrap();
    let child = engine.store().list_codexes(run.run_id).await.unwrap().remove(0);

    let request = SectionRequest {
        codex_id: child.codex_id,
        codex_name: "Child".to_string(),
        section_index: 0,
        input_context: String::new(),
        prerequisite_content: None,
    };
    orchestrator
        .executor()
        .generate_single_section(&request, "Ada Lovelace")
        .await
        .unwrap();

    let summary = orchestrator.orchestrate_run(run.run_id).await.unwrap();
    let child = summary.codex("Child").unwrap();
    assert_eq!(child.status, CodexState::Ready);
    assert_eq!(child.completed_sections, 2);
    // Only the outstanding section went through the provider again
    assert_eq!(engine.gateway.call_count(), 2);
}
