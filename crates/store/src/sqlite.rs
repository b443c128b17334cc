//! SQLite backend.
//!
//! One database file holds every table:
//! - `ai_response_cache`: cached AI responses keyed by prompt hash
//! - `ai_engine_metrics`: one health/usage row per engine
//! - `ai_request_logs`: append-only audit trail
//! - `chat_sessions`, `chat_messages`, `uploaded_files`, `knowledge_documents`:
//!   read-only inputs of the chat layer, written by the surrounding app
//!
//! Timestamps are stored as fixed-width RFC 3339 text (UTC, microseconds),
//! so lexicographic comparison matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use simulai_core::{
    CacheEntry, CacheStore, ChatSession, EngineKind, EngineMetrics, KnowledgeDocument,
    MetricsStore, RequestLog, RequestLogStore, Role, SessionMessage, SessionStore, StoreError,
    UploadedFile,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "ai_response_cache",
        r#"
        CREATE TABLE IF NOT EXISTS ai_response_cache (
            prompt_hash    TEXT PRIMARY KEY NOT NULL,
            prompt_preview TEXT NOT NULL,
            action         TEXT NOT NULL,
            engine_used    TEXT NOT NULL,
            response_data  TEXT NOT NULL,
            tokens_used    INTEGER NOT NULL DEFAULT 0,
            created_at     TEXT NOT NULL,
            expires_at     TEXT NOT NULL,
            hit_count      INTEGER NOT NULL DEFAULT 0
        )
        "#,
    ),
    (
        "ai_engine_metrics",
        r#"
        CREATE TABLE IF NOT EXISTS ai_engine_metrics (
            engine               TEXT PRIMARY KEY NOT NULL,
            request_count        INTEGER NOT NULL DEFAULT 0,
            success_count        INTEGER NOT NULL DEFAULT 0,
            failure_count        INTEGER NOT NULL DEFAULT 0,
            total_tokens         INTEGER NOT NULL DEFAULT 0,
            avg_response_time_ms INTEGER NOT NULL DEFAULT 0,
            last_used_at         TEXT,
            last_error           TEXT,
            is_healthy           INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "ai_request_logs",
        r#"
        CREATE TABLE IF NOT EXISTS ai_request_logs (
            id               TEXT PRIMARY KEY NOT NULL,
            user_id          TEXT,
            engine_used      TEXT NOT NULL,
            action           TEXT NOT NULL,
            prompt_hash      TEXT NOT NULL,
            cache_hit        INTEGER NOT NULL,
            fallback_used    INTEGER NOT NULL,
            fallback_reason  TEXT,
            response_time_ms INTEGER NOT NULL,
            tokens_used      INTEGER NOT NULL,
            success          INTEGER NOT NULL,
            error_message    TEXT,
            created_at       TEXT NOT NULL
        )
        "#,
    ),
    (
        "ai_request_logs index",
        "CREATE INDEX IF NOT EXISTS idx_ai_request_logs_created_at ON ai_request_logs(created_at DESC)",
    ),
    (
        "chat_sessions",
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id         TEXT PRIMARY KEY NOT NULL,
            user_id    TEXT NOT NULL,
            title      TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "chat_messages",
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id         TEXT PRIMARY KEY NOT NULL,
            session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
            role       TEXT NOT NULL,
            content    TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "chat_messages index",
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at)",
    ),
    (
        "uploaded_files",
        r#"
        CREATE TABLE IF NOT EXISTS uploaded_files (
            id             TEXT PRIMARY KEY NOT NULL,
            session_id     TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
            file_name      TEXT NOT NULL,
            file_type      TEXT NOT NULL,
            extracted_text TEXT,
            created_at     TEXT NOT NULL
        )
        "#,
    ),
    (
        "knowledge_documents",
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_documents (
            id         TEXT PRIMARY KEY NOT NULL,
            title      TEXT NOT NULL,
            category   TEXT,
            content    TEXT NOT NULL,
            is_active  INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    ),
];

/// SQLite implementation of every store trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an ephemeral database. The pool is then pinned
    /// to a single connection, since each SQLite connection would otherwise
    /// see its own empty in-memory database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = matches!(path, ":memory:" | "sqlite::memory:");

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            if let Some(parent) = std::path::Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Storage(format!("Failed to create {}: {e}", parent.display()))
                })?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        let options = options.pragma("foreign_keys", "ON");

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(*sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }
        debug!("SQLite migrations complete");
        Ok(())
    }

    pub async fn insert_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(ts(session.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chat_sessions failed: {e}")))?;
        Ok(())
    }

    pub async fn insert_message(&self, message: &SessionMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, session_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&message.id)
        .bind(message.session_id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(ts(message.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chat_messages failed: {e}")))?;
        Ok(())
    }

    pub async fn insert_file(&self, file: &UploadedFile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO uploaded_files (id, session_id, file_name, file_type, extracted_text, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&file.id)
        .bind(file.session_id.to_string())
        .bind(&file.file_name)
        .bind(&file.file_type)
        .bind(&file.extracted_text)
        .bind(ts(file.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT uploaded_files failed: {e}")))?;
        Ok(())
    }

    pub async fn insert_document(&self, document: &KnowledgeDocument) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_documents (id, title, category, content, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                category = excluded.category,
                content = excluded.content,
                is_active = excluded.is_active
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.category)
        .bind(&document.content)
        .bind(document.is_active)
        .bind(ts(document.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT knowledge_documents failed: {e}")))?;
        Ok(())
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn engine_col(row: &SqliteRow, name: &str) -> Result<EngineKind, StoreError> {
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("{name}: unknown engine '{raw}'")))
}

fn uuid_col(row: &SqliteRow, name: &str) -> Result<Uuid, StoreError> {
    let raw: String = col(row, name)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Corrupt(format!("{name}: {e}")))
}

fn count_col(row: &SqliteRow, name: &str) -> Result<u64, StoreError> {
    let raw: i64 = col(row, name)?;
    Ok(raw.max(0) as u64)
}

fn row_to_cache_entry(row: &SqliteRow) -> Result<CacheEntry, StoreError> {
    let response_raw: String = col(row, "response_data")?;
    let response_data = serde_json::from_str(&response_raw)
        .map_err(|e| StoreError::Corrupt(format!("response_data: {e}")))?;
    let created_at: String = col(row, "created_at")?;
    let expires_at: String = col(row, "expires_at")?;

    Ok(CacheEntry {
        prompt_hash: col(row, "prompt_hash")?,
        prompt_preview: col(row, "prompt_preview")?,
        action: col(row, "action")?,
        engine_used: engine_col(row, "engine_used")?,
        response_data,
        tokens_used: count_col(row, "tokens_used")? as u32,
        created_at: parse_ts(&created_at, "created_at")?,
        expires_at: parse_ts(&expires_at, "expires_at")?,
        hit_count: count_col(row, "hit_count")? as u32,
    })
}

fn row_to_metrics(row: &SqliteRow) -> Result<EngineMetrics, StoreError> {
    let last_used_at: Option<String> = col(row, "last_used_at")?;
    let is_healthy: i64 = col(row, "is_healthy")?;

    Ok(EngineMetrics {
        engine: engine_col(row, "engine")?,
        request_count: count_col(row, "request_count")?,
        success_count: count_col(row, "success_count")?,
        failure_count: count_col(row, "failure_count")?,
        total_tokens: count_col(row, "total_tokens")?,
        avg_response_time_ms: count_col(row, "avg_response_time_ms")?,
        last_used_at: last_used_at
            .as_deref()
            .map(|raw| parse_ts(raw, "last_used_at"))
            .transpose()?,
        last_error: col(row, "last_error")?,
        is_healthy: is_healthy != 0,
    })
}

fn row_to_log(row: &SqliteRow) -> Result<RequestLog, StoreError> {
    let created_at: String = col(row, "created_at")?;
    let cache_hit: i64 = col(row, "cache_hit")?;
    let fallback_used: i64 = col(row, "fallback_used")?;
    let success: i64 = col(row, "success")?;

    Ok(RequestLog {
        id: col(row, "id")?,
        user_id: col(row, "user_id")?,
        engine_used: engine_col(row, "engine_used")?,
        action: col(row, "action")?,
        prompt_hash: col(row, "prompt_hash")?,
        cache_hit: cache_hit != 0,
        fallback_used: fallback_used != 0,
        fallback_reason: col(row, "fallback_reason")?,
        response_time_ms: count_col(row, "response_time_ms")?,
        tokens_used: count_col(row, "tokens_used")? as u32,
        success: success != 0,
        error_message: col(row, "error_message")?,
        created_at: parse_ts(&created_at, "created_at")?,
    })
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn find_live(
        &self,
        prompt_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM ai_response_cache WHERE prompt_hash = ?1 AND expires_at > ?2",
        )
        .bind(prompt_hash)
        .bind(ts(now))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("cache lookup: {e}")))?;

        row.as_ref().map(row_to_cache_entry).transpose()
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let response_data = serde_json::to_string(&entry.response_data)
            .map_err(|e| StoreError::Storage(format!("response_data serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO ai_response_cache
                (prompt_hash, prompt_preview, action, engine_used, response_data,
                 tokens_used, created_at, expires_at, hit_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(prompt_hash) DO UPDATE SET
                prompt_preview = excluded.prompt_preview,
                action = excluded.action,
                engine_used = excluded.engine_used,
                response_data = excluded.response_data,
                tokens_used = excluded.tokens_used,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                hit_count = excluded.hit_count
            "#,
        )
        .bind(&entry.prompt_hash)
        .bind(&entry.prompt_preview)
        .bind(&entry.action)
        .bind(entry.engine_used.as_str())
        .bind(&response_data)
        .bind(entry.tokens_used as i64)
        .bind(ts(entry.created_at))
        .bind(ts(entry.expires_at))
        .bind(entry.hit_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("cache upsert failed: {e}")))?;

        debug!(hash = %entry.prompt_hash, "Cached response stored");
        Ok(())
    }

    async fn set_hit_count(&self, prompt_hash: &str, hit_count: u32) -> Result<(), StoreError> {
        sqlx::query("UPDATE ai_response_cache SET hit_count = ?1 WHERE prompt_hash = ?2")
            .bind(hit_count as i64)
            .bind(prompt_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("hit count update failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for SqliteStore {
    async fn get(&self, engine: EngineKind) -> Result<Option<EngineMetrics>, StoreError> {
        let row = sqlx::query("SELECT * FROM ai_engine_metrics WHERE engine = ?1")
            .bind(engine.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("metrics lookup: {e}")))?;
        row.as_ref().map(row_to_metrics).transpose()
    }

    async fn all(&self) -> Result<Vec<EngineMetrics>, StoreError> {
        let rows = sqlx::query("SELECT * FROM ai_engine_metrics ORDER BY engine")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("metrics list: {e}")))?;
        rows.iter().map(row_to_metrics).collect()
    }

    async fn upsert(&self, metrics: EngineMetrics) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ai_engine_metrics
                (engine, request_count, success_count, failure_count, total_tokens,
                 avg_response_time_ms, last_used_at, last_error, is_healthy)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(engine) DO UPDATE SET
                request_count = excluded.request_count,
                success_count = excluded.success_count,
                failure_count = excluded.failure_count,
                total_tokens = excluded.total_tokens,
                avg_response_time_ms = excluded.avg_response_time_ms,
                last_used_at = excluded.last_used_at,
                last_error = excluded.last_error,
                is_healthy = excluded.is_healthy
            "#,
        )
        .bind(metrics.engine.as_str())
        .bind(metrics.request_count as i64)
        .bind(metrics.success_count as i64)
        .bind(metrics.failure_count as i64)
        .bind(metrics.total_tokens as i64)
        .bind(metrics.avg_response_time_ms as i64)
        .bind(metrics.last_used_at.map(ts))
        .bind(&metrics.last_error)
        .bind(metrics.is_healthy)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("metrics upsert failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl RequestLogStore for SqliteStore {
    async fn append(&self, log: RequestLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ai_request_logs
                (id, user_id, engine_used, action, prompt_hash, cache_hit, fallback_used,
                 fallback_reason, response_time_ms, tokens_used, success, error_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(log.engine_used.as_str())
        .bind(&log.action)
        .bind(&log.prompt_hash)
        .bind(log.cache_hit)
        .bind(log.fallback_used)
        .bind(&log.fallback_reason)
        .bind(log.response_time_ms as i64)
        .bind(log.tokens_used as i64)
        .bind(log.success)
        .bind(&log.error_message)
        .bind(ts(log.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("audit insert failed: {e}")))?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RequestLog>, StoreError> {
        let rows = sqlx::query("SELECT * FROM ai_request_logs ORDER BY created_at DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("audit list: {e}")))?;
        rows.iter().map(row_to_log).collect()
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session lookup: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = col(&row, "created_at")?;
        Ok(Some(ChatSession {
            id: uuid_col(&row, "id")?,
            user_id: col(&row, "user_id")?,
            title: col(&row, "title")?,
            created_at: parse_ts(&created_at, "created_at")?,
        }))
    }

    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SessionMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages
                WHERE session_id = ?1
                ORDER BY created_at DESC
                LIMIT ?2
            ) ORDER BY created_at ASC
            "#,
        )
        .bind(session_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("message history: {e}")))?;

        rows.iter()
            .map(|row| {
                let role_raw: String = col(row, "role")?;
                let role = Role::from_str(&role_raw)
                    .map_err(|_| StoreError::Corrupt(format!("role: unknown '{role_raw}'")))?;
                let created_at: String = col(row, "created_at")?;
                Ok(SessionMessage {
                    id: col(row, "id")?,
                    session_id: uuid_col(row, "session_id")?,
                    role,
                    content: col(row, "content")?,
                    created_at: parse_ts(&created_at, "created_at")?,
                })
            })
            .collect()
    }

    async fn session_files(&self, session_id: Uuid) -> Result<Vec<UploadedFile>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM uploaded_files WHERE session_id = ?1 ORDER BY created_at ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("session files: {e}")))?;

        rows.iter()
            .map(|row| {
                let created_at: String = col(row, "created_at")?;
                Ok(UploadedFile {
                    id: col(row, "id")?,
                    session_id: uuid_col(row, "session_id")?,
                    file_name: col(row, "file_name")?,
                    file_type: col(row, "file_type")?,
                    extracted_text: col(row, "extracted_text")?,
                    created_at: parse_ts(&created_at, "created_at")?,
                })
            })
            .collect()
    }

    async fn active_knowledge_documents(&self) -> Result<Vec<KnowledgeDocument>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_documents WHERE is_active = 1 ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("knowledge documents: {e}")))?;

        rows.iter()
            .map(|row| {
                let created_at: String = col(row, "created_at")?;
                let is_active: i64 = col(row, "is_active")?;
                Ok(KnowledgeDocument {
                    id: col(row, "id")?,
                    title: col(row, "title")?,
                    category: col(row, "category")?,
                    content: col(row, "content")?,
                    is_active: is_active != 0,
                    created_at: parse_ts(&created_at, "created_at")?,
                })
            })
            .collect()
    }
}
