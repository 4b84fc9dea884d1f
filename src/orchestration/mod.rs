//! # Orchestration Engine
//!
//! Turns a run's frozen codex definitions into generated content.
//!
//! ## Core Components
//!
//! - **RunOrchestrator**: polling loop that launches codexes as their
//!   prerequisites finish and settles the run
//! - **DependencyResolver**: classifies not-started codexes and assembles
//!   prerequisite content
//! - **SectionBatchExecutor**: bounded-concurrency section generation with
//!   idempotent section initialization
//! - **ExecutionModeEngine**: single, parallel-merge and sequential-chain
//!   strategies over the provider gateway
//! - **QueueManager** / **QueueProcessor**: administrative work list and
//!   the path that turns a queue item into a run
//! - **prerequisite_graph**: edit-time cycle detection
//!
//! Status rows in the [`CodexStore`](crate::database::CodexStore) are the
//! single source of truth; components never share in-process state beyond
//! them.

pub mod dependency_resolver;
pub mod errors;
pub mod execution_mode;
pub mod notification;
pub mod prerequisite_graph;
pub mod prompts;
pub mod queue_manager;
pub mod run_orchestrator;
pub mod section_executor;

pub use dependency_resolver::{classify, DependencyResolver, Readiness, ReadinessReport, ReadyCodex};
pub use errors::ExecutionError;
pub use execution_mode::{CallUsage, ExecutionContext, ExecutionModeEngine, ExecutionOutput};
pub use notification::{CompletionNotifier, NoopNotifier, RunCompletion, WebhookNotifier};
pub use prerequisite_graph::{transitive_closure, validate_prerequisites, would_create_cycle};
pub use queue_manager::{
    BulkAction, BulkOutcome, BulkRequest, EnqueueRequest, QueueDispatcher, QueueManager,
    QueueProcessor, SpawningDispatcher,
};
pub use run_orchestrator::{CodexProgress, RunOrchestrator, RunSummary};
pub use section_executor::{CodexGenerationInput, CodexOutcome, SectionBatchExecutor, SectionRequest};
