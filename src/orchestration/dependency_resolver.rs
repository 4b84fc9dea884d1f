//! # Dependency Resolver
//!
//! Decides which codexes of a run may start and assembles the content each
//! one receives from its prerequisites.
//!
//! Classification of a `not_started` codex:
//!
//! - **Skipped**: no section templates. Never started, never blocks anyone.
//! - **Deferred**: needs the run's source document and none is attached yet,
//!   or depends on a deferred codex. Left untouched until a document arrives.
//! - **Doomed**: a prerequisite failed or is not part of the run.
//! - **Ready**: every prerequisite is `ready`, `ready_with_errors` or skipped.
//! - **Blocked**: otherwise; the orchestrator polls until it becomes ready.
//!
//! Acyclicity is enforced when prerequisites are edited, so a cycle here
//! shows up as codexes that stay blocked until the polling window closes.

use crate::constants::delimiters::prerequisite_header;
use crate::database::CodexStore;
use crate::error::Result;
use crate::models::Codex;
use crate::state_machine::CodexState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Blocked { waiting_on: Vec<String> },
    Deferred,
    Skipped,
    Doomed(String),
}

/// A codex that may start, with its assembled prerequisite content
#[derive(Debug, Clone)]
pub struct ReadyCodex {
    pub codex: Codex,
    pub prerequisite_content: Option<String>,
}

#[derive(Debug, Default)]
pub struct ReadinessReport {
    pub ready: Vec<ReadyCodex>,
    pub blocked: Vec<(Codex, Vec<String>)>,
    pub deferred: Vec<Codex>,
    pub skipped: Vec<Codex>,
    pub doomed: Vec<(Codex, String)>,
}

/// Classify every `not_started` codex of a run
pub fn classify(codexes: &[Codex], has_source_document: bool) -> Vec<(Codex, Readiness)> {
    let by_name: HashMap<&str, &Codex> = codexes.iter().map(|c| (c.name.as_str(), c)).collect();

    // Names known complete: terminal success states plus zero-section codexes
    let completed: HashSet<&str> = codexes
        .iter()
        .filter(|c| c.status.satisfies_dependencies() || !c.has_sections())
        .map(|c| c.name.as_str())
        .collect();

    let mut deferred: HashSet<&str> = codexes
        .iter()
        .filter(|c| {
            c.status == CodexState::NotStarted
                && c.has_sections()
                && c.depends_on_source_document()
                && !has_source_document
        })
        .map(|c| c.name.as_str())
        .collect();

    // Propagate deferral to dependents until a fixed point
    loop {
        let newly_deferred: Vec<&str> = codexes
            .iter()
            .filter(|c| c.status == CodexState::NotStarted && !deferred.contains(c.name.as_str()))
            .filter(|c| c.prerequisites().iter().any(|p| deferred.contains(p.as_str())))
            .map(|c| c.name.as_str())
            .collect();
        if newly_deferred.is_empty() {
            break;
        }
        deferred.extend(newly_deferred);
    }

    codexes
        .iter()
        .filter(|c| c.status == CodexState::NotStarted)
        .map(|codex| {
            let readiness = if !codex.has_sections() {
                Readiness::Skipped
            } else if deferred.contains(codex.name.as_str()) {
                Readiness::Deferred
            } else {
                prerequisite_readiness(codex, &by_name, &completed)
            };
            (codex.clone(), readiness)
        })
        .collect()
}

fn prerequisite_readiness(
    codex: &Codex,
    by_name: &HashMap<&str, &Codex>,
    completed: &HashSet<&str>,
) -> Readiness {
    let mut waiting_on = Vec::new();

    for prerequisite in codex.prerequisites() {
        if completed.contains(prerequisite.as_str()) {
            continue;
        }
        match by_name.get(prerequisite.as_str()) {
            None => {
                return Readiness::Doomed(format!(
                    "prerequisite '{prerequisite}' is not part of this run"
                ))
            }
            Some(other) if other.status == CodexState::Failed => {
                return Readiness::Doomed(format!("prerequisite '{prerequisite}' failed"))
            }
            Some(_) => waiting_on.push(prerequisite.clone()),
        }
    }

    if waiting_on.is_empty() {
        Readiness::Ready
    } else {
        Readiness::Blocked { waiting_on }
    }
}

pub struct DependencyResolver {
    store: Arc<dyn CodexStore>,
}

impl DependencyResolver {
    pub fn new(store: Arc<dyn CodexStore>) -> Self {
        Self { store }
    }

    /// Classify the run's codexes and assemble content for the ready ones
    pub async fn discover(
        &self,
        codexes: &[Codex],
        source_document: Option<&str>,
    ) -> Result<ReadinessReport> {
        let mut report = ReadinessReport::default();

        for (codex, readiness) in classify(codexes, source_document.is_some()) {
            match readiness {
                Readiness::Ready => {
                    let prerequisite_content = self
                        .prerequisite_content(&codex, codexes, source_document)
                        .await?;
                    report.ready.push(ReadyCodex {
                        codex,
                        prerequisite_content,
                    });
                }
                Readiness::Blocked { waiting_on } => report.blocked.push((codex, waiting_on)),
                Readiness::Deferred => report.deferred.push(codex),
                Readiness::Skipped => report.skipped.push(codex),
                Readiness::Doomed(reason) => report.doomed.push((codex, reason)),
            }
        }

        debug!(
            ready = report.ready.len(),
            blocked = report.blocked.len(),
            deferred = report.deferred.len(),
            skipped = report.skipped.len(),
            doomed = report.doomed.len(),
            "Dependency discovery complete"
        );

        Ok(report)
    }

    /// Source document (when flagged) followed by each prerequisite's
    /// completed sections under a `=== CONTENT FROM: <NAME> ===` header
    pub async fn prerequisite_content(
        &self,
        codex: &Codex,
        run_codexes: &[Codex],
        source_document: Option<&str>,
    ) -> Result<Option<String>> {
        let mut blocks = Vec::new();

        if codex.depends_on_source_document() {
            if let Some(document) = source_document {
                blocks.push(document.to_string());
            }
        }

        for name in codex.prerequisites() {
            let Some(prerequisite) = run_codexes.iter().find(|c| &c.name == name) else {
                continue;
            };
            let sections = self
                .store
                .list_completed_sections(prerequisite.codex_id)
                .await?;
            let contents: Vec<&str> = sections
                .iter()
                .filter_map(|s| s.completed_content())
                .collect();
            if contents.is_empty() {
                continue;
            }
            blocks.push(format!(
                "{}\n\n{}",
                prerequisite_header(&prerequisite.name),
                contents.join("\n\n")
            ));
        }

        Ok((!blocks.is_empty()).then(|| blocks.join("\n\n")))
    }
}
