//! # Database Operations
//!
//! Persistence for runs, definitions, codexes, sections, queue items, usage
//! records and the provider registry.
//!
//! - [`store`] - the [`CodexStore`] trait every component depends on
//! - [`postgres`] - PostgreSQL implementation with embedded migrations
//! - [`memory`] - in-process implementation for tests and local runs

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::InMemoryStore;
pub use postgres::{connect, PgCodexStore, MIGRATOR};
pub use store::CodexStore;
