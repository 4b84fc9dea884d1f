//! # Run Orchestrator
//!
//! Drives one run from `pending` to a terminal state by looping over the
//! [`DependencyResolver`]:
//!
//! ```text
//! discover ──► launch ready codexes ──► wait (codex finished | poll interval)
//!    ▲                                              │
//!    └──────────────────────────────────────────────┘
//! ```
//!
//! Ready codexes run concurrently on their own tasks. A blocked codex holds
//! no task: it is re-examined every poll interval and fails once it has
//! waited for `dependency_max_attempts` intervals. Persisted status rows are
//! the only coordination channel between the loop and the codex tasks.
//!
//! Cancellation stops new launches, lets in-flight codexes wind down at
//! their next batch or section boundary, then marks the run `cancelled`.

use super::dependency_resolver::DependencyResolver;
use super::notification::{CompletionNotifier, RunCompletion};
use super::section_executor::{CodexGenerationInput, CodexOutcome, SectionBatchExecutor};
use crate::config::OrchestrationConfig;
use crate::database::CodexStore;
use crate::error::{CodexError, Result};
use crate::logging::{log_codex_operation, log_run_operation};
use crate::models::{Codex, CodexDefinition, NewRun, Run, RunInput};
use crate::state_machine::{CodexEvent, CodexState, CodexStateMachine, RunEvent, RunState, RunStateMachine};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Progress of one codex within a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexProgress {
    pub codex_id: Uuid,
    pub name: String,
    pub status: CodexState,
    pub total_sections: i32,
    pub completed_sections: i32,
    pub error_message: Option<String>,
}

/// Run status with per-codex progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub subject: String,
    pub status: RunState,
    pub cancel_requested: bool,
    pub codexes: Vec<CodexProgress>,
}

impl RunSummary {
    fn new(run: &Run, codexes: &[Codex]) -> Self {
        Self {
            run_id: run.run_id,
            subject: run.subject.clone(),
            status: run.status,
            cancel_requested: run.cancel_requested,
            codexes: codexes
                .iter()
                .map(|c| CodexProgress {
                    codex_id: c.codex_id,
                    name: c.name.clone(),
                    status: c.status,
                    total_sections: c.total_sections,
                    completed_sections: c.completed_sections,
                    error_message: c.error_message.clone(),
                })
                .collect(),
        }
    }

    pub fn codex(&self, name: &str) -> Option<&CodexProgress> {
        self.codexes.iter().find(|c| c.name == name)
    }
}

/// Removes the run from the active set when orchestration returns
struct ActiveRunGuard<'a> {
    active_runs: &'a DashMap<Uuid, ()>,
    run_id: Uuid,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.active_runs.remove(&self.run_id);
    }
}

pub struct RunOrchestrator {
    store: Arc<dyn CodexStore>,
    dependencies: DependencyResolver,
    executor: Arc<SectionBatchExecutor>,
    notifier: Arc<dyn CompletionNotifier>,
    poll_interval: Duration,
    max_attempts: u32,
    active_runs: DashMap<Uuid, ()>,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<dyn CodexStore>,
        executor: Arc<SectionBatchExecutor>,
        notifier: Arc<dyn CompletionNotifier>,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            dependencies: DependencyResolver::new(store.clone()),
            store,
            executor,
            notifier,
            poll_interval: config.dependency_poll_interval(),
            max_attempts: config.dependency_max_attempts,
            active_runs: DashMap::new(),
        }
    }

    pub fn executor(&self) -> &Arc<SectionBatchExecutor> {
        &self.executor
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether an orchestration loop for the run is live in this process
    pub fn is_orchestrating(&self, run_id: Uuid) -> bool {
        self.active_runs.contains_key(&run_id)
    }

    /// Create a run capturing every active definition in display order
    pub async fn create_run(&self, subject: impl Into<String>, input: RunInput) -> Result<Run> {
        let definitions = self.store.list_active_definitions().await?;
        self.create_run_with_definitions(
            NewRun {
                subject: subject.into(),
                input,
            },
            definitions,
        )
        .await
    }

    /// Create a run with an explicit set of frozen definitions
    pub async fn create_run_with_definitions(
        &self,
        new_run: NewRun,
        definitions: Vec<CodexDefinition>,
    ) -> Result<Run> {
        if new_run.subject.trim().is_empty() {
            return Err(CodexError::ValidationError("subject cannot be empty".to_string()));
        }

        let run = Run::from_new(new_run);
        let codexes: Vec<Codex> = definitions
            .into_iter()
            .map(|definition| Codex::from_definition(run.run_id, definition))
            .collect();
        self.store.create_run(&run, &codexes).await?;

        log_run_operation(
            "run_created",
            run.run_id,
            "pending",
            Some(&format!("{} codexes", codexes.len())),
        );
        Ok(run)
    }

    pub async fn run_status(&self, run_id: Uuid) -> Result<RunSummary> {
        let run = self.load_run(run_id).await?;
        let codexes = self.store.list_codexes(run_id).await?;
        Ok(RunSummary::new(&run, &codexes))
    }

    /// Drive a run until every startable codex reached a terminal state
    ///
    /// A second invocation for a run already being orchestrated in this
    /// process returns the current status without doing any work.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn orchestrate_run(&self, run_id: Uuid) -> Result<RunSummary> {
        if self.active_runs.insert(run_id, ()).is_some() {
            info!("Run already being orchestrated");
            return self.run_status(run_id).await;
        }
        let _guard = ActiveRunGuard {
            active_runs: &self.active_runs,
            run_id,
        };

        let mut run = self.load_run(run_id).await?;
        if run.status.is_terminal() {
            debug!(status = %run.status, "Run already finished");
            return self.run_status(run_id).await;
        }
        if run.cancel_requested {
            return self.finish_cancelled(run).await;
        }
        if run.status == RunState::Pending {
            RunStateMachine::apply(&mut run, &RunEvent::Start)?;
            self.store.update_run(&run).await?;
            log_run_operation("orchestration_started", run_id, "generating", None);
        }

        let mut in_flight: JoinSet<Result<CodexOutcome>> = JoinSet::new();
        let mut launched: HashSet<Uuid> = HashSet::new();
        let mut wait_attempts: HashMap<Uuid, u32> = HashMap::new();
        let mut first_pass = true;

        loop {
            let run = self.load_run(run_id).await?;
            if run.cancel_requested {
                info!(in_flight = in_flight.len(), "Cancellation requested, draining in-flight codexes");
                drain(&mut in_flight).await;
                return self.finish_cancelled(run).await;
            }

            let codexes = self.store.list_codexes(run_id).await?;
            let input_context = run.input.answers_context();
            let source_document = run.input.source_document();

            // Codexes left generating by an interrupted invocation resume once
            if first_pass {
                for codex in codexes.iter().filter(|c| c.status == CodexState::Generating) {
                    let prerequisite_content = self
                        .dependencies
                        .prerequisite_content(codex, &codexes, source_document)
                        .await?;
                    self.launch(
                        &mut in_flight,
                        &mut launched,
                        codex,
                        CodexGenerationInput {
                            subject: run.subject.clone(),
                            input_context: input_context.clone(),
                            prerequisite_content,
                        },
                    );
                }
                first_pass = false;
            }

            let report = self.dependencies.discover(&codexes, source_document).await?;

            for (codex, reason) in report.doomed {
                self.fail_codex(codex, reason).await?;
            }

            for ready in report.ready {
                if launched.contains(&ready.codex.codex_id) {
                    continue;
                }
                self.launch(
                    &mut in_flight,
                    &mut launched,
                    &ready.codex,
                    CodexGenerationInput {
                        subject: run.subject.clone(),
                        input_context: input_context.clone(),
                        prerequisite_content: ready.prerequisite_content,
                    },
                );
            }

            let blocked: Vec<(Codex, Vec<String>)> = report
                .blocked
                .into_iter()
                .filter(|(c, _)| !launched.contains(&c.codex_id))
                .collect();

            if in_flight.is_empty() && blocked.is_empty() {
                break;
            }

            let polled = tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    record_outcome(joined);
                    false
                }
                _ = tokio::time::sleep(self.poll_interval) => true,
            };

            if polled {
                for (codex, waiting_on) in blocked {
                    let attempts = wait_attempts.entry(codex.codex_id).or_insert(0);
                    *attempts += 1;
                    if *attempts >= self.max_attempts {
                        warn!(
                            codex = %codex.name,
                            attempts = *attempts,
                            waiting_on = ?waiting_on,
                            "Dependency wait exhausted"
                        );
                        let reason = format!(
                            "timed out waiting for prerequisites: {}",
                            waiting_on.join(", ")
                        );
                        self.fail_codex(codex, reason).await?;
                    }
                }
            }
        }

        self.finish_completed(run_id).await
    }

    fn launch(
        &self,
        in_flight: &mut JoinSet<Result<CodexOutcome>>,
        launched: &mut HashSet<Uuid>,
        codex: &Codex,
        input: CodexGenerationInput,
    ) {
        if !launched.insert(codex.codex_id) {
            return;
        }
        debug!(codex = %codex.name, "Launching codex generation");
        let executor = self.executor.clone();
        let codex_id = codex.codex_id;
        in_flight.spawn(async move { executor.execute_codex(codex_id, &input).await });
    }

    async fn fail_codex(&self, mut codex: Codex, reason: String) -> Result<()> {
        if !matches!(codex.status, CodexState::NotStarted | CodexState::Generating) {
            return Ok(());
        }
        CodexStateMachine::apply(&mut codex, &CodexEvent::Fail(reason))?;
        self.store.update_codex(&codex).await?;
        log_codex_operation(
            "codex_failed",
            Some(codex.run_id),
            codex.codex_id,
            &codex.name,
            "failed",
            codex.error_message.as_deref(),
        );
        Ok(())
    }

    async fn finish_completed(&self, run_id: Uuid) -> Result<RunSummary> {
        let mut run = self.load_run(run_id).await?;
        RunStateMachine::apply(&mut run, &RunEvent::Complete)?;
        self.store.update_run(&run).await?;

        let codexes = self.store.list_codexes(run_id).await?;
        let summary = RunSummary::new(&run, &codexes);
        log_run_operation("orchestration_finished", run_id, "completed", None);

        let completion = RunCompletion {
            run_id,
            subject: run.subject.clone(),
            status: run.status,
            codex_count: codexes.len(),
            failed_codexes: codexes
                .iter()
                .filter(|c| c.status == CodexState::Failed)
                .map(|c| c.name.clone())
                .collect(),
        };
        if let Err(e) = self.notifier.notify(&completion).await {
            warn!(run_id = %run_id, error = %e, "Completion notification failed");
        }

        Ok(summary)
    }

    async fn finish_cancelled(&self, mut run: Run) -> Result<RunSummary> {
        if !run.status.is_terminal() {
            RunStateMachine::apply(&mut run, &RunEvent::Cancel)?;
            self.store.update_run(&run).await?;
            log_run_operation("orchestration_cancelled", run.run_id, "cancelled", None);
        }
        self.run_status(run.run_id).await
    }

    /// Flag a run for cooperative cancellation
    ///
    /// A run that has not started is cancelled immediately; a generating run
    /// is cancelled by its orchestration loop once in-flight work drains.
    pub async fn request_cancellation(&self, run_id: Uuid) -> Result<RunSummary> {
        let mut run = self.load_run(run_id).await?;
        if run.status.is_terminal() {
            return Err(CodexError::ValidationError(format!(
                "run {run_id} is already {}",
                run.status
            )));
        }

        self.store.request_run_cancellation(run_id).await?;
        log_run_operation("cancellation_requested", run_id, &run.status.to_string(), None);

        if run.status == RunState::Pending && !self.is_orchestrating(run_id) {
            run.cancel_requested = true;
            return self.finish_cancelled(run).await;
        }
        self.run_status(run_id).await
    }

    /// Attach a source document; a finished run is reopened so orchestration
    /// can pick up codexes that were waiting on it
    pub async fn ingest_source_document(&self, run_id: Uuid, document: &str) -> Result<Run> {
        if document.trim().is_empty() {
            return Err(CodexError::ValidationError(
                "source document cannot be empty".to_string(),
            ));
        }

        let mut run = self.load_run(run_id).await?;
        self.store.set_source_document(run_id, document).await?;

        if run.status.is_terminal() {
            let was_cancelled = run.cancel_requested;
            RunStateMachine::apply(&mut run, &RunEvent::Reopen)?;
            self.store.update_run(&run).await?;
            if was_cancelled {
                self.store.clear_run_cancellation(run_id).await?;
            }
            log_run_operation("run_reopened", run_id, "pending", Some("source document ingested"));
        }

        self.load_run(run_id).await
    }

    /// Reopen a finished run so its codexes can be generated again
    pub async fn reopen_run(&self, run_id: Uuid) -> Result<Run> {
        let mut run = self.load_run(run_id).await?;
        if run.status.is_terminal() {
            // Per-codex flags from queue cancellations outlive a completed run
            let was_cancelled = run.cancel_requested;
            RunStateMachine::apply(&mut run, &RunEvent::Reopen)?;
            self.store.update_run(&run).await?;
            if was_cancelled {
                self.store.clear_run_cancellation(run_id).await?;
            }
            log_run_operation("run_reopened", run_id, "pending", None);
        }
        Ok(run)
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Run> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or_else(|| CodexError::run_not_found(run_id))
    }
}

fn record_outcome(joined: std::result::Result<Result<CodexOutcome>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(outcome)) => debug!(
            codex_id = %outcome.codex_id,
            status = %outcome.status,
            completed = outcome.completed_sections,
            errored = outcome.errored_sections,
            "Codex finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "Codex generation ended with an error"),
        Err(e) => error!(error = %e, "Codex generation task aborted"),
    }
}

async fn drain(in_flight: &mut JoinSet<Result<CodexOutcome>>) {
    while let Some(joined) = in_flight.join_next().await {
        record_outcome(joined);
    }
}
