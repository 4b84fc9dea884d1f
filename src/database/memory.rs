//! In-process [`CodexStore`] backed by `parking_lot` locks.
//!
//! Used by tests and single-process deployments without PostgreSQL. All
//! state lives behind one mutex, so check-then-create sequences such as
//! section initialization are atomic.

use super::store::CodexStore;
use crate::error::{CodexError, Result};
use crate::models::{
    Codex, CodexDefinition, NewSection, ProviderCredential, ProviderRecord, QueueItem, Run,
    Section, UsageRecord,
};
use crate::state_machine::QueueItemState;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    runs: HashMap<Uuid, Run>,
    definitions: HashMap<Uuid, CodexDefinition>,
    codexes: HashMap<Uuid, Codex>,
    sections: HashMap<Uuid, Vec<Section>>,
    queue: HashMap<Uuid, QueueItem>,
    usage: Vec<UsageRecord>,
    providers: HashMap<String, ProviderRecord>,
    credentials: HashMap<String, ProviderCredential>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    fail_usage_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make usage inserts fail, to exercise accounting error handling
    pub fn set_fail_usage_writes(&self, fail: bool) {
        self.fail_usage_writes.store(fail, Ordering::SeqCst);
    }

    pub fn usage_record_count(&self) -> usize {
        self.inner.lock().usage.len()
    }
}

fn sorted_sections(sections: &[Section]) -> Vec<Section> {
    let mut sorted = sections.to_vec();
    sorted.sort_by_key(|s| s.section_index);
    sorted
}

#[async_trait]
impl CodexStore for InMemoryStore {
    async fn create_run(&self, run: &Run, codexes: &[Codex]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.runs.contains_key(&run.run_id) {
            return Err(CodexError::DatabaseError(format!(
                "run {} already exists",
                run.run_id
            )));
        }
        inner.runs.insert(run.run_id, run.clone());
        for codex in codexes {
            inner.codexes.insert(codex.codex_id, codex.clone());
        }
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        Ok(self.inner.lock().runs.get(&run_id).cloned())
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| CodexError::run_not_found(run.run_id))?;
        stored.status = run.status;
        stored.completed_at = run.completed_at;
        stored.updated_at = run.updated_at;
        Ok(())
    }

    async fn set_source_document(&self, run_id: Uuid, document: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| CodexError::run_not_found(run_id))?;
        stored.input.source_document = Some(document.to_string());
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn request_run_cancellation(&self, run_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| CodexError::run_not_found(run_id))?;
        run.cancel_requested = true;
        run.updated_at = Utc::now();
        for codex in inner.codexes.values_mut() {
            if codex.run_id == run_id && !codex.status.is_terminal() {
                codex.cancel_requested = true;
            }
        }
        Ok(())
    }

    async fn clear_run_cancellation(&self, run_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| CodexError::run_not_found(run_id))?;
        run.cancel_requested = false;
        for codex in inner.codexes.values_mut() {
            if codex.run_id == run_id {
                codex.cancel_requested = false;
            }
        }
        Ok(())
    }

    async fn list_active_definitions(&self) -> Result<Vec<CodexDefinition>> {
        let inner = self.inner.lock();
        let mut definitions: Vec<CodexDefinition> = inner
            .definitions
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        definitions.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(definitions)
    }

    async fn list_definitions(&self) -> Result<Vec<CodexDefinition>> {
        let inner = self.inner.lock();
        let mut definitions: Vec<CodexDefinition> = inner.definitions.values().cloned().collect();
        definitions.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(definitions)
    }

    async fn get_definition(&self, definition_id: Uuid) -> Result<Option<CodexDefinition>> {
        Ok(self.inner.lock().definitions.get(&definition_id).cloned())
    }

    async fn save_definition(&self, definition: &CodexDefinition) -> Result<()> {
        let mut inner = self.inner.lock();
        let duplicate_name = inner.definitions.values().any(|d| {
            d.name == definition.name && d.definition_id != definition.definition_id
        });
        if duplicate_name {
            return Err(CodexError::ValidationError(format!(
                "a codex definition named '{}' already exists",
                definition.name
            )));
        }
        inner
            .definitions
            .insert(definition.definition_id, definition.clone());
        Ok(())
    }

    async fn create_codex(&self, codex: &Codex) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.runs.contains_key(&codex.run_id) {
            return Err(CodexError::run_not_found(codex.run_id));
        }
        inner.codexes.insert(codex.codex_id, codex.clone());
        Ok(())
    }

    async fn list_codexes(&self, run_id: Uuid) -> Result<Vec<Codex>> {
        let inner = self.inner.lock();
        let mut codexes: Vec<Codex> = inner
            .codexes
            .values()
            .filter(|c| c.run_id == run_id)
            .cloned()
            .collect();
        codexes.sort_by(|a, b| {
            a.definition
                .display_order
                .cmp(&b.definition.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(codexes)
    }

    async fn get_codex(&self, codex_id: Uuid) -> Result<Option<Codex>> {
        Ok(self.inner.lock().codexes.get(&codex_id).cloned())
    }

    async fn update_codex(&self, codex: &Codex) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .codexes
            .get_mut(&codex.codex_id)
            .ok_or_else(|| CodexError::codex_not_found(codex.codex_id))?;
        stored.status = codex.status;
        stored.total_sections = codex.total_sections;
        stored.completed_sections = codex.completed_sections;
        stored.error_message = codex.error_message.clone();
        stored.updated_at = codex.updated_at;
        Ok(())
    }

    async fn request_codex_cancellation(&self, codex_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .codexes
            .get_mut(&codex_id)
            .ok_or_else(|| CodexError::codex_not_found(codex_id))?;
        stored.cancel_requested = true;
        Ok(())
    }

    async fn clear_codex_cancellation(&self, codex_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .codexes
            .get_mut(&codex_id)
            .ok_or_else(|| CodexError::codex_not_found(codex_id))?;
        stored.cancel_requested = false;
        Ok(())
    }

    async fn initialize_sections(
        &self,
        codex_id: Uuid,
        sections: Vec<NewSection>,
    ) -> Result<Vec<Section>> {
        let mut inner = self.inner.lock();
        if !inner.codexes.contains_key(&codex_id) {
            return Err(CodexError::codex_not_found(codex_id));
        }
        let existing = inner.sections.entry(codex_id).or_default();
        if existing.is_empty() {
            existing.extend(
                sections
                    .into_iter()
                    .map(|new_section| Section::from_new(codex_id, new_section)),
            );
        }
        Ok(sorted_sections(existing))
    }

    async fn list_sections(&self, codex_id: Uuid) -> Result<Vec<Section>> {
        let inner = self.inner.lock();
        Ok(inner
            .sections
            .get(&codex_id)
            .map(|s| sorted_sections(s))
            .unwrap_or_default())
    }

    async fn list_completed_sections(&self, codex_id: Uuid) -> Result<Vec<Section>> {
        let sections = self.list_sections(codex_id).await?;
        Ok(sections
            .into_iter()
            .filter(|s| s.completed_content().is_some())
            .collect())
    }

    async fn update_section(&self, section: &Section) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner
            .sections
            .get_mut(&section.codex_id)
            .and_then(|sections| {
                sections
                    .iter_mut()
                    .find(|s| s.section_id == section.section_id)
            })
            .ok_or_else(|| CodexError::not_found("Section", section.section_id))?;
        *stored = section.clone();
        Ok(())
    }

    async fn insert_queue_items(&self, items: &[QueueItem]) -> Result<()> {
        let mut inner = self.inner.lock();
        for item in items {
            inner.queue.insert(item.item_id, item.clone());
        }
        Ok(())
    }

    async fn get_queue_item(&self, item_id: Uuid) -> Result<Option<QueueItem>> {
        Ok(self.inner.lock().queue.get(&item_id).cloned())
    }

    async fn get_queue_items(&self, item_ids: &[Uuid]) -> Result<Vec<QueueItem>> {
        let inner = self.inner.lock();
        Ok(item_ids
            .iter()
            .filter_map(|id| inner.queue.get(id).cloned())
            .collect())
    }

    async fn list_queue_items(&self, status: Option<QueueItemState>) -> Result<Vec<QueueItem>> {
        let inner = self.inner.lock();
        let mut items: Vec<QueueItem> = inner
            .queue
            .values()
            .filter(|item| status.map_or(true, |s| item.status == s))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn claim_queue_item(&self, item: &QueueItem) -> Result<bool> {
        let mut inner = self.inner.lock();
        let stored = inner
            .queue
            .get_mut(&item.item_id)
            .ok_or_else(|| CodexError::not_found("Queue item", item.item_id))?;
        if stored.status != QueueItemState::Pending {
            return Ok(false);
        }
        stored.status = item.status;
        stored.started_at = item.started_at;
        stored.updated_at = item.updated_at;
        Ok(true)
    }

    async fn update_queue_item(&self, item: &QueueItem) -> Result<()> {
        self.update_queue_items(std::slice::from_ref(item)).await
    }

    async fn update_queue_items(&self, items: &[QueueItem]) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(missing) = items.iter().find(|i| !inner.queue.contains_key(&i.item_id)) {
            return Err(CodexError::not_found("Queue item", missing.item_id));
        }
        for item in items {
            inner.queue.insert(item.item_id, item.clone());
        }
        Ok(())
    }

    async fn delete_queue_items(&self, item_ids: &[Uuid]) -> Result<u64> {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        for id in item_ids {
            if inner.queue.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn insert_usage_record(&self, record: &UsageRecord) -> Result<()> {
        if self.fail_usage_writes.load(Ordering::SeqCst) {
            return Err(CodexError::DatabaseError(
                "usage record insert rejected".to_string(),
            ));
        }
        self.inner.lock().usage.push(record.clone());
        Ok(())
    }

    async fn list_usage_records(&self, run_id: Uuid) -> Result<Vec<UsageRecord>> {
        Ok(self
            .inner
            .lock()
            .usage
            .iter()
            .filter(|r| r.run_id == Some(run_id))
            .cloned()
            .collect())
    }

    async fn list_providers(&self) -> Result<Vec<ProviderRecord>> {
        Ok(self.inner.lock().providers.values().cloned().collect())
    }

    async fn get_credential(&self, provider_id: &str) -> Result<Option<ProviderCredential>> {
        Ok(self.inner.lock().credentials.get(provider_id).cloned())
    }

    async fn upsert_provider(&self, provider: &ProviderRecord) -> Result<()> {
        self.inner
            .lock()
            .providers
            .insert(provider.provider_id.clone(), provider.clone());
        Ok(())
    }

    async fn upsert_credential(&self, credential: &ProviderCredential) -> Result<()> {
        self.inner
            .lock()
            .credentials
            .insert(credential.provider_id.clone(), credential.clone());
        Ok(())
    }
}
