//! # System Constants
//!
//! Default operational knobs, content delimiters and usage function names
//! shared across the orchestration engine.

use std::time::Duration;

// Re-export state types for convenience
pub use crate::state_machine::{
    CodexState as CodexStatus, QueueItemState as QueueItemStatus, RunState as RunStatus,
    SectionState as SectionStatus,
};

/// Number of sections generated concurrently within one codex.
pub const DEFAULT_SECTION_BATCH_SIZE: usize = 5;

/// Interval between dependency readiness polls.
pub const DEFAULT_DEPENDENCY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls before a blocked codex is marked failed.
pub const DEFAULT_DEPENDENCY_MAX_ATTEMPTS: u32 = 60;

/// Upper bound on completion tokens when neither the caller nor config specify one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default outbound provider request timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Message stored on a codex interrupted by cooperative cancellation.
pub const CANCELLED_MESSAGE: &str = "generation cancelled";

/// Delimiters used when assembling multi-part prompts
pub mod delimiters {
    /// Header placed before each prerequisite codex's content.
    pub fn prerequisite_header(codex_name: &str) -> String {
        format!("=== CONTENT FROM: {} ===", codex_name.to_uppercase())
    }

    /// Header placed before each parallel generation result in a merge prompt.
    pub fn merge_result_header(provider: &str, model: &str) -> String {
        format!("=== RESULT FROM {provider}({model}) ===")
    }

    pub const SOURCE_DOCUMENT_HEADER: &str = "=== SOURCE DOCUMENT ===";
}

/// Function names recorded on usage records
pub mod usage_functions {
    pub const GENERATE_SECTION: &str = "generate_section";
    pub const PARALLEL_GENERATION: &str = "parallel_generation";
    pub const MERGE_RESULTS: &str = "merge_results";
    pub const CHAIN_STEP: &str = "chain_step";
}

/// Status groupings used by readiness and cleanup queries
pub mod status_groups {
    use crate::state_machine::{CodexState, QueueItemState};

    /// Codex states that unblock dependents
    pub const CODEX_SUCCESS_STATES: [CodexState; 2] =
        [CodexState::Ready, CodexState::ReadyWithErrors];

    /// Codex states that end generation
    pub const CODEX_TERMINAL_STATES: [CodexState; 3] = [
        CodexState::Ready,
        CodexState::ReadyWithErrors,
        CodexState::Failed,
    ];

    /// Queue item states from which deletion is allowed
    pub const QUEUE_DELETABLE_STATES: [QueueItemState; 3] = [
        QueueItemState::Completed,
        QueueItemState::Failed,
        QueueItemState::Cancelled,
    ];
}
