pub mod codex;
pub mod codex_definition;
pub mod provider;
pub mod queue_item;
pub mod run;
pub mod section;
pub mod usage_record;

// Re-export core models for easy access
pub use codex::Codex;
pub use codex_definition::{
    ChainStep, CodexDefinition, ExecutionConfig, ModelStep, SectionTemplate, WordCountBounds,
};
pub use provider::{ProviderCredential, ProviderProtocol, ProviderRecord};
pub use queue_item::{NewQueueItem, QueueItem};
pub use run::{NewRun, Run, RunInput};
pub use section::{NewSection, Section};
pub use usage_record::{TokenUsage, UsageRecord, UsageStatus};
