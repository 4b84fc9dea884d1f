//! # Definition Service
//!
//! Administrative edits to codex definitions. Every prerequisite mutation
//! goes through the reachability check in
//! [`prerequisite_graph`](crate::orchestration::prerequisite_graph), so
//! the graph the run-time resolver sees is always acyclic.

use crate::database::CodexStore;
use crate::error::{CodexError, Result};
use crate::models::CodexDefinition;
use crate::orchestration::prerequisite_graph::{validate_prerequisites, would_create_cycle};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct DefinitionService {
    store: Arc<dyn CodexStore>,
}

impl DefinitionService {
    pub fn new(store: Arc<dyn CodexStore>) -> Self {
        Self { store }
    }

    pub async fn list_definitions(&self) -> Result<Vec<CodexDefinition>> {
        self.store.list_definitions().await
    }

    pub async fn get_definition(&self, definition_id: Uuid) -> Result<CodexDefinition> {
        self.store
            .get_definition(definition_id)
            .await?
            .ok_or_else(|| CodexError::not_found("Codex definition", definition_id))
    }

    /// Create or replace a definition after validating its fields and prerequisites
    #[instrument(skip(self, definition), fields(name = %definition.name))]
    pub async fn save_definition(&self, mut definition: CodexDefinition) -> Result<CodexDefinition> {
        definition.validate()?;

        let definitions = self.store.list_definitions().await?;
        let mut graph: Vec<CodexDefinition> = definitions
            .into_iter()
            .filter(|d| d.definition_id != definition.definition_id)
            .collect();
        graph.push(definition.clone());
        validate_prerequisites(&graph, &definition.name, &definition.prerequisites)?;

        definition.updated_at = Utc::now();
        self.store.save_definition(&definition).await?;
        info!(definition_id = %definition.definition_id, "Codex definition saved");
        Ok(definition)
    }

    /// Replace the full prerequisite list
    pub async fn set_prerequisites(
        &self,
        definition_id: Uuid,
        prerequisites: Vec<String>,
    ) -> Result<CodexDefinition> {
        let mut definition = self.get_definition(definition_id).await?;
        let definitions = self.store.list_definitions().await?;
        validate_prerequisites(&definitions, &definition.name, &prerequisites)?;

        definition.prerequisites = prerequisites;
        self.persist(definition).await
    }

    /// Add one prerequisite edge, rejecting it if it would close a cycle
    pub async fn add_prerequisite(&self, definition_id: Uuid, prerequisite: &str) -> Result<CodexDefinition> {
        let mut definition = self.get_definition(definition_id).await?;
        if definition.prerequisites.iter().any(|p| p == prerequisite) {
            return Ok(definition);
        }

        let definitions = self.store.list_definitions().await?;
        if !definitions.iter().any(|d| d.name == prerequisite) {
            return Err(CodexError::ValidationError(format!(
                "unknown prerequisite '{prerequisite}'"
            )));
        }
        if would_create_cycle(&definitions, &definition.name, prerequisite) {
            return Err(CodexError::CircularDependency {
                codex: definition.name,
                prerequisite: prerequisite.to_string(),
            });
        }

        definition.prerequisites.push(prerequisite.to_string());
        self.persist(definition).await
    }

    pub async fn remove_prerequisite(&self, definition_id: Uuid, prerequisite: &str) -> Result<CodexDefinition> {
        let mut definition = self.get_definition(definition_id).await?;
        definition.prerequisites.retain(|p| p != prerequisite);
        self.persist(definition).await
    }

    async fn persist(&self, mut definition: CodexDefinition) -> Result<CodexDefinition> {
        definition.updated_at = Utc::now();
        self.store.save_definition(&definition).await?;
        info!(
            definition_id = %definition.definition_id,
            prerequisites = ?definition.prerequisites,
            "Prerequisites updated"
        );
        Ok(definition)
    }
}
