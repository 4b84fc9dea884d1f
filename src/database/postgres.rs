//! PostgreSQL [`CodexStore`] using `sqlx` runtime queries.
//!
//! Status columns are TEXT written through the state enums' `Display` and
//! read back through `FromStr`; definition snapshots and execution configs
//! are JSONB.

use super::store::CodexStore;
use crate::config::DatabaseConfig;
use crate::error::{CodexError, Result};
use crate::models::{
    Codex, CodexDefinition, ExecutionConfig, NewSection, ProviderCredential, ProviderProtocol,
    ProviderRecord, QueueItem, Run, RunInput, Section, SectionTemplate, UsageRecord,
    UsageStatus, WordCountBounds,
};
use crate::state_machine::{CodexState, QueueItemState, RunState, SectionState};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool and optionally apply migrations
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| CodexError::ConfigurationError("database.url is not set".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await?;

    if config.run_migrations {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CodexError::DatabaseError(format!("migration failed: {e}")))?;
        info!("Database migrations applied");
    }

    Ok(pool)
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(CodexError::DatabaseError)
}

fn run_from_row(row: &PgRow) -> Result<Run> {
    let Json(answers): Json<serde_json::Value> = row.try_get("answers")?;
    Ok(Run {
        run_id: row.try_get("run_id")?,
        subject: row.try_get("subject")?,
        input: RunInput {
            answers,
            source_document: row.try_get("source_document")?,
        },
        status: parse_column::<RunState>(row, "status")?,
        cancel_requested: row.try_get("cancel_requested")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn definition_from_row(row: &PgRow) -> Result<CodexDefinition> {
    let Json(section_templates): Json<Vec<SectionTemplate>> = row.try_get("section_templates")?;
    let Json(prerequisites): Json<Vec<String>> = row.try_get("prerequisites")?;
    let Json(execution): Json<ExecutionConfig> = row.try_get("execution")?;
    let word_count_min: i32 = row.try_get("word_count_min")?;
    let word_count_max: i32 = row.try_get("word_count_max")?;

    Ok(CodexDefinition {
        definition_id: row.try_get("definition_id")?,
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        display_order: row.try_get("display_order")?,
        is_active: row.try_get("is_active")?,
        system_prompt: row.try_get("system_prompt")?,
        section_templates,
        prerequisites,
        depends_on_source_document: row.try_get("depends_on_source_document")?,
        word_count: WordCountBounds {
            min: word_count_min.max(0) as u32,
            max: word_count_max.max(0) as u32,
        },
        execution,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn codex_from_row(row: &PgRow) -> Result<Codex> {
    let Json(definition): Json<CodexDefinition> = row.try_get("definition_snapshot")?;
    Ok(Codex {
        codex_id: row.try_get("codex_id")?,
        run_id: row.try_get("run_id")?,
        definition_id: row.try_get("definition_id")?,
        name: row.try_get("name")?,
        definition,
        status: parse_column::<CodexState>(row, "status")?,
        total_sections: row.try_get("total_sections")?,
        completed_sections: row.try_get("completed_sections")?,
        error_message: row.try_get("error_message")?,
        cancel_requested: row.try_get("cancel_requested")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn section_from_row(row: &PgRow) -> Result<Section> {
    Ok(Section {
        section_id: row.try_get("section_id")?,
        codex_id: row.try_get("codex_id")?,
        section_index: row.try_get("section_index")?,
        name: row.try_get("name")?,
        status: parse_column::<SectionState>(row, "status")?,
        content: row.try_get("content")?,
        error_message: row.try_get("error_message")?,
        retry_count: row.try_get("retry_count")?,
        regeneration_count: row.try_get("regeneration_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn queue_item_from_row(row: &PgRow) -> Result<QueueItem> {
    Ok(QueueItem {
        item_id: row.try_get("item_id")?,
        subject: row.try_get("subject")?,
        definition_id: row.try_get("definition_id")?,
        run_id: row.try_get("run_id")?,
        status: parse_column::<QueueItemState>(row, "status")?,
        provider_id: row.try_get("provider_id")?,
        model: row.try_get("model")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn usage_from_row(row: &PgRow) -> Result<UsageRecord> {
    Ok(UsageRecord {
        usage_id: row.try_get("usage_id")?,
        run_id: row.try_get("run_id")?,
        codex_id: row.try_get("codex_id")?,
        function_name: row.try_get("function_name")?,
        provider: row.try_get("provider")?,
        model: row.try_get("model")?,
        prompt_tokens: row.try_get("prompt_tokens")?,
        completion_tokens: row.try_get("completion_tokens")?,
        total_tokens: row.try_get("total_tokens")?,
        cost_usd: row.try_get("cost_usd")?,
        status: parse_column::<UsageStatus>(row, "status")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}

fn provider_from_row(row: &PgRow) -> Result<ProviderRecord> {
    Ok(ProviderRecord {
        provider_id: row.try_get("provider_id")?,
        name: row.try_get("name")?,
        protocol: parse_column::<ProviderProtocol>(row, "protocol")?,
        base_url: row.try_get("base_url")?,
        default_model: row.try_get("default_model")?,
        priority: row.try_get("priority")?,
        is_active: row.try_get("is_active")?,
    })
}

const RUN_COLUMNS: &str = "run_id, subject, answers, source_document, status, cancel_requested, \
     created_at, updated_at, completed_at";

const CODEX_COLUMNS: &str = "codex_id, run_id, definition_id, name, definition_snapshot, status, \
     total_sections, completed_sections, error_message, cancel_requested, created_at, updated_at";

const SECTION_COLUMNS: &str = "section_id, codex_id, section_index, name, status, content, \
     error_message, retry_count, regeneration_count, created_at, updated_at";

const QUEUE_COLUMNS: &str = "item_id, subject, definition_id, run_id, status, provider_id, model, \
     error_message, created_at, started_at, completed_at, updated_at";

const DEFINITION_COLUMNS: &str = "definition_id, name, version, display_order, is_active, \
     system_prompt, section_templates, prerequisites, depends_on_source_document, \
     word_count_min, word_count_max, execution, created_at, updated_at";

pub struct PgCodexStore {
    pool: PgPool,
}

impl PgCodexStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS health").fetch_one(&self.pool).await?;
        let health: i32 = row.try_get("health")?;
        Ok(health == 1)
    }

    async fn insert_codex<'e, E>(executor: E, codex: &Codex) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            "INSERT INTO codex_instances (codex_id, run_id, definition_id, name, display_order, \
             definition_snapshot, status, total_sections, completed_sections, error_message, \
             cancel_requested, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(codex.codex_id)
        .bind(codex.run_id)
        .bind(codex.definition_id)
        .bind(&codex.name)
        .bind(codex.definition.display_order)
        .bind(Json(&codex.definition))
        .bind(codex.status.to_string())
        .bind(codex.total_sections)
        .bind(codex.completed_sections)
        .bind(&codex.error_message)
        .bind(codex.cancel_requested)
        .bind(codex.created_at)
        .bind(codex.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CodexStore for PgCodexStore {
    async fn create_run(&self, run: &Run, codexes: &[Codex]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO codex_runs (run_id, subject, answers, source_document, status, \
             cancel_requested, created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(run.run_id)
        .bind(&run.subject)
        .bind(Json(&run.input.answers))
        .bind(&run.input.source_document)
        .bind(run.status.to_string())
        .bind(run.cancel_requested)
        .bind(run.created_at)
        .bind(run.updated_at)
        .bind(run.completed_at)
        .execute(&mut *tx)
        .await?;

        for codex in codexes {
            Self::insert_codex(&mut *tx, codex).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM codex_runs WHERE run_id = $1"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let result = sqlx::query(
            "UPDATE codex_runs SET status = $2, completed_at = $3, updated_at = $4 \
             WHERE run_id = $1",
        )
        .bind(run.run_id)
        .bind(run.status.to_string())
        .bind(run.completed_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::run_not_found(run.run_id));
        }
        Ok(())
    }

    async fn set_source_document(&self, run_id: Uuid, document: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE codex_runs SET source_document = $2, updated_at = now() WHERE run_id = $1",
        )
        .bind(run_id)
        .bind(document)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::run_not_found(run_id));
        }
        Ok(())
    }

    async fn request_run_cancellation(&self, run_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE codex_runs SET cancel_requested = true, updated_at = now() WHERE run_id = $1",
        )
        .bind(run_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CodexError::run_not_found(run_id));
        }

        sqlx::query(
            "UPDATE codex_instances SET cancel_requested = true \
             WHERE run_id = $1 AND status NOT IN ('ready', 'ready_with_errors', 'failed')",
        )
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear_run_cancellation(&self, run_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE codex_runs SET cancel_requested = false WHERE run_id = $1")
            .bind(run_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CodexError::run_not_found(run_id));
        }

        sqlx::query("UPDATE codex_instances SET cancel_requested = false WHERE run_id = $1")
            .bind(run_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_active_definitions(&self) -> Result<Vec<CodexDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM codex_definitions \
             WHERE is_active ORDER BY display_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn list_definitions(&self) -> Result<Vec<CodexDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM codex_definitions ORDER BY display_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn get_definition(&self, definition_id: Uuid) -> Result<Option<CodexDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM codex_definitions WHERE definition_id = $1"
        ))
        .bind(definition_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(definition_from_row).transpose()
    }

    async fn save_definition(&self, definition: &CodexDefinition) -> Result<()> {
        sqlx::query(
            "INSERT INTO codex_definitions (definition_id, name, version, display_order, \
             is_active, system_prompt, section_templates, prerequisites, \
             depends_on_source_document, word_count_min, word_count_max, execution, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (definition_id) DO UPDATE SET \
             name = EXCLUDED.name, version = EXCLUDED.version, \
             display_order = EXCLUDED.display_order, is_active = EXCLUDED.is_active, \
             system_prompt = EXCLUDED.system_prompt, \
             section_templates = EXCLUDED.section_templates, \
             prerequisites = EXCLUDED.prerequisites, \
             depends_on_source_document = EXCLUDED.depends_on_source_document, \
             word_count_min = EXCLUDED.word_count_min, word_count_max = EXCLUDED.word_count_max, \
             execution = EXCLUDED.execution, updated_at = EXCLUDED.updated_at",
        )
        .bind(definition.definition_id)
        .bind(&definition.name)
        .bind(definition.version)
        .bind(definition.display_order)
        .bind(definition.is_active)
        .bind(&definition.system_prompt)
        .bind(Json(&definition.section_templates))
        .bind(Json(&definition.prerequisites))
        .bind(definition.depends_on_source_document)
        .bind(definition.word_count.min as i32)
        .bind(definition.word_count.max as i32)
        .bind(Json(&definition.execution))
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_codex(&self, codex: &Codex) -> Result<()> {
        Self::insert_codex(&self.pool, codex).await
    }

    async fn list_codexes(&self, run_id: Uuid) -> Result<Vec<Codex>> {
        let rows = sqlx::query(&format!(
            "SELECT {CODEX_COLUMNS} FROM codex_instances WHERE run_id = $1 \
             ORDER BY display_order, name"
        ))
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(codex_from_row).collect()
    }

    async fn get_codex(&self, codex_id: Uuid) -> Result<Option<Codex>> {
        let row = sqlx::query(&format!(
            "SELECT {CODEX_COLUMNS} FROM codex_instances WHERE codex_id = $1"
        ))
        .bind(codex_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(codex_from_row).transpose()
    }

    async fn update_codex(&self, codex: &Codex) -> Result<()> {
        let result = sqlx::query(
            "UPDATE codex_instances SET status = $2, total_sections = $3, \
             completed_sections = $4, error_message = $5, updated_at = $6 \
             WHERE codex_id = $1",
        )
        .bind(codex.codex_id)
        .bind(codex.status.to_string())
        .bind(codex.total_sections)
        .bind(codex.completed_sections)
        .bind(&codex.error_message)
        .bind(codex.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::codex_not_found(codex.codex_id));
        }
        Ok(())
    }

    async fn request_codex_cancellation(&self, codex_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("UPDATE codex_instances SET cancel_requested = true WHERE codex_id = $1")
                .bind(codex_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::codex_not_found(codex_id));
        }
        Ok(())
    }

    async fn clear_codex_cancellation(&self, codex_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("UPDATE codex_instances SET cancel_requested = false WHERE codex_id = $1")
                .bind(codex_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::codex_not_found(codex_id));
        }
        Ok(())
    }

    async fn initialize_sections(
        &self,
        codex_id: Uuid,
        sections: Vec<NewSection>,
    ) -> Result<Vec<Section>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for new_section in sections {
            sqlx::query(
                "INSERT INTO codex_sections (section_id, codex_id, section_index, name, status, \
                 retry_count, regeneration_count, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, 0, 0, $6, $6) \
                 ON CONFLICT (codex_id, section_index) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(codex_id)
            .bind(new_section.section_index)
            .bind(&new_section.name)
            .bind(SectionState::Pending.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.list_sections(codex_id).await
    }

    async fn list_sections(&self, codex_id: Uuid) -> Result<Vec<Section>> {
        let rows = sqlx::query(&format!(
            "SELECT {SECTION_COLUMNS} FROM codex_sections WHERE codex_id = $1 \
             ORDER BY section_index"
        ))
        .bind(codex_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(section_from_row).collect()
    }

    async fn list_completed_sections(&self, codex_id: Uuid) -> Result<Vec<Section>> {
        let rows = sqlx::query(&format!(
            "SELECT {SECTION_COLUMNS} FROM codex_sections \
             WHERE codex_id = $1 AND status = 'completed' AND coalesce(content, '') <> '' \
             ORDER BY section_index"
        ))
        .bind(codex_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(section_from_row).collect()
    }

    async fn update_section(&self, section: &Section) -> Result<()> {
        let result = sqlx::query(
            "UPDATE codex_sections SET status = $2, content = $3, error_message = $4, \
             retry_count = $5, regeneration_count = $6, updated_at = $7 \
             WHERE section_id = $1",
        )
        .bind(section.section_id)
        .bind(section.status.to_string())
        .bind(&section.content)
        .bind(&section.error_message)
        .bind(section.retry_count)
        .bind(section.regeneration_count)
        .bind(section.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CodexError::not_found("Section", section.section_id));
        }
        Ok(())
    }

    async fn insert_queue_items(&self, items: &[QueueItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(&format!(
                "INSERT INTO codex_queue_items ({QUEUE_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ))
            .bind(item.item_id)
            .bind(&item.subject)
            .bind(item.definition_id)
            .bind(item.run_id)
            .bind(item.status.to_string())
            .bind(&item.provider_id)
            .bind(&item.model)
            .bind(&item.error_message)
            .bind(item.created_at)
            .bind(item.started_at)
            .bind(item.completed_at)
            .bind(item.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_queue_item(&self, item_id: Uuid) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM codex_queue_items WHERE item_id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(queue_item_from_row).transpose()
    }

    async fn get_queue_items(&self, item_ids: &[Uuid]) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM codex_queue_items WHERE item_id = ANY($1) \
             ORDER BY created_at"
        ))
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(queue_item_from_row).collect()
    }

    async fn list_queue_items(&self, status: Option<QueueItemState>) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM codex_queue_items \
             WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at"
        ))
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(queue_item_from_row).collect()
    }

    async fn claim_queue_item(&self, item: &QueueItem) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE codex_queue_items SET status = $2, started_at = $3, updated_at = $4 \
             WHERE item_id = $1 AND status = 'pending'",
        )
        .bind(item.item_id)
        .bind(item.status.to_string())
        .bind(item.started_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_queue_item(&self, item: &QueueItem) -> Result<()> {
        self.update_queue_items(std::slice::from_ref(item)).await
    }

    async fn update_queue_items(&self, items: &[QueueItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            let result = sqlx::query(
                "UPDATE codex_queue_items SET run_id = $2, status = $3, provider_id = $4, \
                 model = $5, error_message = $6, started_at = $7, completed_at = $8, \
                 updated_at = $9 WHERE item_id = $1",
            )
            .bind(item.item_id)
            .bind(item.run_id)
            .bind(item.status.to_string())
            .bind(&item.provider_id)
            .bind(&item.model)
            .bind(&item.error_message)
            .bind(item.started_at)
            .bind(item.completed_at)
            .bind(item.updated_at)
            .execute(&mut *tx)
            .await?;

            // Dropping the transaction without commit rolls back earlier rows
            if result.rows_affected() == 0 {
                return Err(CodexError::not_found("Queue item", item.item_id));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_queue_items(&self, item_ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM codex_queue_items WHERE item_id = ANY($1)")
            .bind(item_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_usage_record(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO codex_usage_records (usage_id, run_id, codex_id, function_name, \
             provider, model, prompt_tokens, completion_tokens, total_tokens, cost_usd, status, \
             error_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(record.usage_id)
        .bind(record.run_id)
        .bind(record.codex_id)
        .bind(&record.function_name)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.prompt_tokens)
        .bind(record.completion_tokens)
        .bind(record.total_tokens)
        .bind(record.cost_usd)
        .bind(record.status.to_string())
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_usage_records(&self, run_id: Uuid) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            "SELECT usage_id, run_id, codex_id, function_name, provider, model, prompt_tokens, \
             completion_tokens, total_tokens, cost_usd, status, error_message, created_at \
             FROM codex_usage_records WHERE run_id = $1 ORDER BY created_at",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(usage_from_row).collect()
    }

    async fn list_providers(&self) -> Result<Vec<ProviderRecord>> {
        let rows = sqlx::query(
            "SELECT provider_id, name, protocol, base_url, default_model, priority, is_active \
             FROM codex_providers ORDER BY priority, provider_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(provider_from_row).collect()
    }

    async fn get_credential(&self, provider_id: &str) -> Result<Option<ProviderCredential>> {
        let row = sqlx::query(
            "SELECT provider_id, api_key, is_active FROM codex_provider_credentials \
             WHERE provider_id = $1",
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<ProviderCredential> {
            Ok(ProviderCredential {
                provider_id: row.try_get("provider_id")?,
                api_key: row.try_get("api_key")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .transpose()
    }

    async fn upsert_provider(&self, provider: &ProviderRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO codex_providers (provider_id, name, protocol, base_url, default_model, \
             priority, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (provider_id) DO UPDATE SET name = EXCLUDED.name, \
             protocol = EXCLUDED.protocol, base_url = EXCLUDED.base_url, \
             default_model = EXCLUDED.default_model, priority = EXCLUDED.priority, \
             is_active = EXCLUDED.is_active",
        )
        .bind(&provider.provider_id)
        .bind(&provider.name)
        .bind(provider.protocol.to_string())
        .bind(&provider.base_url)
        .bind(&provider.default_model)
        .bind(provider.priority)
        .bind(provider.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_credential(&self, credential: &ProviderCredential) -> Result<()> {
        sqlx::query(
            "INSERT INTO codex_provider_credentials (provider_id, api_key, is_active, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (provider_id) DO UPDATE SET api_key = EXCLUDED.api_key, \
             is_active = EXCLUDED.is_active, updated_at = now()",
        )
        .bind(&credential.provider_id)
        .bind(&credential.api_key)
        .bind(credential.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
