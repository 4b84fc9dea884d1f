//! # Persistence Seam
//!
//! [`CodexStore`] is the single persistence collaborator of the engine.
//! Status rows are the source of truth and the synchronization point between
//! concurrent generation tasks, so writers update only the columns they own:
//!
//! * `update_run` / `update_codex` never touch the cancellation flags; those
//!   are written through the dedicated cancellation methods so a racing
//!   status write cannot clear a pending cancellation.
//! * `initialize_sections` is idempotent: when rows already exist for the
//!   codex they are returned unchanged.
//! * `update_queue_items` and `delete_queue_items` are all-or-nothing.
//! * `claim_queue_item` is the only way out of `pending` for a processor;
//!   at most one concurrent claim of an item succeeds.

use crate::error::Result;
use crate::models::{
    Codex, CodexDefinition, NewSection, ProviderCredential, ProviderRecord, QueueItem, Run,
    Section, UsageRecord,
};
use crate::state_machine::QueueItemState;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait CodexStore: Send + Sync {
    // Runs

    /// Insert a run together with its frozen codex rows
    async fn create_run(&self, run: &Run, codexes: &[Codex]) -> Result<()>;
    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>>;
    /// Persist status and timestamps
    async fn update_run(&self, run: &Run) -> Result<()>;
    async fn set_source_document(&self, run_id: Uuid, document: &str) -> Result<()>;
    /// Flag the run and all of its non-terminal codexes for cancellation
    async fn request_run_cancellation(&self, run_id: Uuid) -> Result<()>;
    /// Clear cancellation flags on the run and its codexes
    async fn clear_run_cancellation(&self, run_id: Uuid) -> Result<()>;

    // Definitions

    /// Active definitions ordered by display order
    async fn list_active_definitions(&self) -> Result<Vec<CodexDefinition>>;
    async fn list_definitions(&self) -> Result<Vec<CodexDefinition>>;
    async fn get_definition(&self, definition_id: Uuid) -> Result<Option<CodexDefinition>>;
    async fn save_definition(&self, definition: &CodexDefinition) -> Result<()>;

    // Codexes

    async fn create_codex(&self, codex: &Codex) -> Result<()>;
    /// Codexes of a run ordered by their definition's display order
    async fn list_codexes(&self, run_id: Uuid) -> Result<Vec<Codex>>;
    async fn get_codex(&self, codex_id: Uuid) -> Result<Option<Codex>>;
    /// Persist status, section counts and error message
    async fn update_codex(&self, codex: &Codex) -> Result<()>;
    async fn request_codex_cancellation(&self, codex_id: Uuid) -> Result<()>;
    async fn clear_codex_cancellation(&self, codex_id: Uuid) -> Result<()>;

    // Sections

    /// Create the codex's sections unless they already exist; returns all
    /// sections ordered by index
    async fn initialize_sections(
        &self,
        codex_id: Uuid,
        sections: Vec<NewSection>,
    ) -> Result<Vec<Section>>;
    async fn list_sections(&self, codex_id: Uuid) -> Result<Vec<Section>>;
    /// Completed sections ordered by index
    async fn list_completed_sections(&self, codex_id: Uuid) -> Result<Vec<Section>>;
    async fn update_section(&self, section: &Section) -> Result<()>;

    // Queue

    async fn insert_queue_items(&self, items: &[QueueItem]) -> Result<()>;
    async fn get_queue_item(&self, item_id: Uuid) -> Result<Option<QueueItem>>;
    async fn get_queue_items(&self, item_ids: &[Uuid]) -> Result<Vec<QueueItem>>;
    /// Items ordered by creation time, optionally filtered by status
    async fn list_queue_items(&self, status: Option<QueueItemState>) -> Result<Vec<QueueItem>>;
    /// Persist `item`'s processing status only if the stored row is still
    /// `pending`; returns whether this caller won the claim
    async fn claim_queue_item(&self, item: &QueueItem) -> Result<bool>;
    async fn update_queue_item(&self, item: &QueueItem) -> Result<()>;
    async fn update_queue_items(&self, items: &[QueueItem]) -> Result<()>;
    async fn delete_queue_items(&self, item_ids: &[Uuid]) -> Result<u64>;

    // Usage

    async fn insert_usage_record(&self, record: &UsageRecord) -> Result<()>;
    async fn list_usage_records(&self, run_id: Uuid) -> Result<Vec<UsageRecord>>;

    // Provider registry

    async fn list_providers(&self) -> Result<Vec<ProviderRecord>>;
    async fn get_credential(&self, provider_id: &str) -> Result<Option<ProviderCredential>>;
    async fn upsert_provider(&self, provider: &ProviderRecord) -> Result<()>;
    async fn upsert_credential(&self, credential: &ProviderCredential) -> Result<()>;
}
