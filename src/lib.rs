#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Codex Core
//!
//! Generation orchestration engine for long-form structured documents
//! ("codexes") produced by external text-generation models.
//!
//! ## Overview
//!
//! A run captures one subject and the codex definitions active when it was
//! created. The engine then:
//!
//! 1. resolves prerequisite codexes into a valid execution order,
//! 2. generates each codex's sections in bounded concurrent batches,
//! 3. runs every section through one of three execution strategies
//!    (single call, parallel fan-out with merge, sequential refinement
//!    chain) against pluggable model providers,
//! 4. tracks run, codex, section and queue item status through explicit
//!    state machines.
//!
//! ## Module Organization
//!
//! - [`models`] - runs, definitions, codexes, sections, queue items, usage records
//! - [`state_machine`] - state enums, events and transition functions per entity
//! - [`database`] - the `CodexStore` persistence seam with Postgres and in-memory stores
//! - [`providers`] - provider gateway, wire protocols and three-tier resolution
//! - [`usage`] - pricing table and the usage ledger
//! - [`orchestration`] - dependency resolution, execution modes, batch executor, run loop, queue
//! - [`services`] - definition editing with cycle rejection
//! - [`web`] - axum trigger and administration surface
//! - [`config`] - YAML configuration with environment overlays
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codex_core::config::ConfigManager;
//! use codex_core::database::{CodexStore, InMemoryStore};
//! use codex_core::orchestration::NoopNotifier;
//! use codex_core::providers::{HttpProviderGateway, ProviderResolver};
//! use codex_core::web::state::AppState;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! let store: Arc<dyn CodexStore> = Arc::new(InMemoryStore::new());
//! let state = AppState::build(
//!     store.clone(),
//!     Arc::new(HttpProviderGateway::new(&config.providers)?),
//!     ProviderResolver::new(store, config.providers.default_provider.clone()),
//!     Arc::new(NoopNotifier),
//!     config,
//! );
//!
//! let run = state.orchestrator.create_run("subject-1", Default::default()).await?;
//! let summary = state.orchestrator.orchestrate_run(run.run_id).await?;
//! println!("run finished as {}", summary.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod providers;
pub mod services;
pub mod state_machine;
pub mod usage;
pub mod web;

pub use config::{CodexConfig, ConfigManager};
pub use constants::{CodexStatus, QueueItemStatus, RunStatus, SectionStatus};
pub use error::{CodexError, Result};
