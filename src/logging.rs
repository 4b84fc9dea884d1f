//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestration engine.
//! Human-readable output by default; JSON lines when `CODEX_LOG_FORMAT=json`.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json_output = std::env::var("CODEX_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json_output {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json_output,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CODEX_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for run operations
pub fn log_run_operation(operation: &str, run_id: Uuid, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        run_id = %run_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RUN_OPERATION"
    );
}

/// Log structured data for codex operations
pub fn log_codex_operation(
    operation: &str,
    run_id: Option<Uuid>,
    codex_id: Uuid,
    codex_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        run_id = ?run_id,
        codex_id = %codex_id,
        codex_name = %codex_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CODEX_OPERATION"
    );
}

/// Log structured data for section operations
pub fn log_section_operation(
    operation: &str,
    codex_id: Uuid,
    section_index: i32,
    section_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        codex_id = %codex_id,
        section_index = section_index,
        section_name = %section_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "SECTION_OPERATION"
    );
}

/// Log structured data for queue operations
pub fn log_queue_operation(operation: &str, item_ids: &[Uuid], status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        item_count = item_ids.len(),
        item_ids = ?item_ids,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "QUEUE_OPERATION"
    );
}
