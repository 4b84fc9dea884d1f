//! # Prerequisite Graph
//!
//! Codex definitions reference their prerequisites by name, forming a
//! directed graph that must stay acyclic. Edits are validated here before
//! they reach the store; runs and queue processing use the transitive
//! closure to pull in everything a definition needs.

use crate::error::{CodexError, Result};
use crate::models::CodexDefinition;
use std::collections::{HashMap, HashSet, VecDeque};

fn prerequisite_map(definitions: &[CodexDefinition]) -> HashMap<&str, &[String]> {
    definitions
        .iter()
        .map(|d| (d.name.as_str(), d.prerequisites.as_slice()))
        .collect()
}

/// Whether adding `codex -> prerequisite` would close a cycle
///
/// True when `prerequisite` is `codex` itself or when `codex` is already
/// reachable from `prerequisite`.
pub fn would_create_cycle(definitions: &[CodexDefinition], codex: &str, prerequisite: &str) -> bool {
    if codex == prerequisite {
        return true;
    }

    let graph = prerequisite_map(definitions);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([prerequisite]);

    while let Some(current) = queue.pop_front() {
        if current == codex {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = graph.get(current) {
            queue.extend(next.iter().map(String::as_str));
        }
    }

    false
}

/// Validate a full prerequisite list for `codex` against the other definitions
pub fn validate_prerequisites(
    definitions: &[CodexDefinition],
    codex: &str,
    prerequisites: &[String],
) -> Result<()> {
    let known: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();

    let mut seen = HashSet::new();
    for prerequisite in prerequisites {
        if !seen.insert(prerequisite.as_str()) {
            return Err(CodexError::ValidationError(format!(
                "prerequisite '{prerequisite}' listed more than once"
            )));
        }
        if prerequisite != codex && !known.contains(prerequisite.as_str()) {
            return Err(CodexError::ValidationError(format!(
                "unknown prerequisite '{prerequisite}'"
            )));
        }
    }

    // Check against the graph without codex's current edges
    let others: Vec<CodexDefinition> = definitions
        .iter()
        .filter(|d| d.name != codex)
        .cloned()
        .collect();

    for prerequisite in prerequisites {
        if would_create_cycle(&others, codex, prerequisite) {
            return Err(CodexError::CircularDependency {
                codex: codex.to_string(),
                prerequisite: prerequisite.clone(),
            });
        }
    }

    Ok(())
}

/// `root` plus every definition it transitively depends on, prerequisites first
pub fn transitive_closure(definitions: &[CodexDefinition], root: &CodexDefinition) -> Vec<CodexDefinition> {
    let by_name: HashMap<&str, &CodexDefinition> =
        definitions.iter().map(|d| (d.name.as_str(), d)).collect();

    let mut ordered: Vec<CodexDefinition> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visit(root, &by_name, &mut visited, &mut ordered);
    ordered
}

fn visit(
    definition: &CodexDefinition,
    by_name: &HashMap<&str, &CodexDefinition>,
    visited: &mut HashSet<String>,
    ordered: &mut Vec<CodexDefinition>,
) {
    if !visited.insert(definition.name.clone()) {
        return;
    }
    for name in &definition.prerequisites {
        if let Some(prerequisite) = by_name.get(name.as_str()) {
            visit(prerequisite, by_name, visited, ordered);
        }
    }
    ordered.push(definition.clone());
}
