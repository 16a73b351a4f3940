//! SQLite task storage backend.
//!
//! Production-ready persistence for single-instance deployments, or for
//! multiple worker *processes* sharing one database file. Concurrency across
//! workers is handled entirely by the `reserve` query's `IMMEDIATE`
//! transaction plus WAL mode — see `DESIGN.md`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Acquire, Row, SqlitePool};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::traits::{Backend, ReservedTask, TaskResult, TaskStatus};

/// Configuration for the SQLite backend.
#[derive(Debug, Clone)]
pub struct SqliteBackendConfig {
    /// Database file path (use ":memory:" for an ephemeral, in-process store).
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    pub create_database_if_missing: bool,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("sitq.db"),
            max_connections: 10,
            busy_timeout_secs: 30,
            create_database_if_missing: true,
        }
    }
}

/// SQLite-backed task storage.
pub struct SqliteBackend {
    pool: SqlitePool,
}

fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Reserved => "reserved",
        TaskStatus::Success => "success",
        TaskStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> Result<TaskStatus, BackendError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "reserved" => Ok(TaskStatus::Reserved),
        "success" => Ok(TaskStatus::Success),
        "failed" => Ok(TaskStatus::Failed),
        other => Err(BackendError::storage(
            "decode_status",
            None,
            std::io::Error::other(format!("unknown task status: {other}")),
        )),
    }
}

impl SqliteBackend {
    /// Connect with default configuration.
    pub async fn new() -> Result<Self, BackendError> {
        Self::with_config(SqliteBackendConfig::default()).await
    }

    /// Connect with custom configuration and run migrations.
    pub async fn with_config(config: SqliteBackendConfig) -> Result<Self, BackendError> {
        info!(database_path = ?config.database_path, "initializing SQLite task backend");

        let db_path_str = config.database_path.to_string_lossy();
        let pool = if db_path_str == ":memory:" {
            // Named, shared-cache URI so every pooled connection sees the
            // same in-memory database within this process.
            let unique_name = uuid::Uuid::now_v7();
            let uri = format!("file:{unique_name}?mode=memory&cache=shared");
            SqlitePool::connect(&uri).await?
        } else {
            let connect_options = SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(config.create_database_if_missing)
                .busy_timeout(std::time::Duration::from_secs(config.busy_timeout_secs));
            SqlitePool::connect_with(connect_options).await?
        };

        let backend = Self { pool };
        backend.migrate().await?;
        Ok(backend)
    }

    async fn migrate(&self) -> Result<(), BackendError> {
        debug!("running task backend migrations");

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                available_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                result_value BLOB,
                error_message TEXT,
                traceback TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tasks_status_eta ON tasks (status, available_at, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status)")
            .execute(&self.pool)
            .await?;

        debug!("task backend migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<(), BackendError> {
        self.migrate().await
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.pool.close().await;
        Ok(())
    }

    async fn enqueue(
        &self,
        task_id: &str,
        payload: Vec<u8>,
        available_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (task_id, payload, status, available_at, created_at)
            VALUES (?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(&payload)
        .bind(available_at.to_rfc3339())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(BackendError::DuplicateTask(task_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reserve(
        &self,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservedTask>, BackendError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }

        let now_iso = now.to_rfc3339();
        let max_items = i64::try_from(max_items).unwrap_or(i64::MAX);

        // IMMEDIATE acquires the write lock up front instead of on first
        // write, so a losing concurrent `reserve` fails fast on `SQLITE_BUSY`
        // (retried by the busy timeout) rather than deadlocking mid-statement.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let rows = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'reserved', started_at = ?
            WHERE task_id IN (
                SELECT task_id FROM tasks
                WHERE status = 'pending' AND available_at <= ?
                ORDER BY available_at, created_at
                LIMIT ?
            )
            RETURNING task_id, payload, started_at
            "#,
        )
        .bind(&now_iso)
        .bind(&now_iso)
        .bind(max_items)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        rows.into_iter()
            .map(|row| {
                let started_at: String = row.get("started_at");
                Ok(ReservedTask {
                    task_id: row.get("task_id"),
                    payload: row.get("payload"),
                    started_at: DateTime::parse_from_rfc3339(&started_at)
                        .map_err(|e| {
                            BackendError::storage("reserve", None, std::io::Error::other(e))
                        })?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }

    async fn mark_success(
        &self,
        task_id: &str,
        encoded_value: Vec<u8>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'success', result_value = ?, finished_at = ?
            WHERE task_id = ? AND status = 'reserved'
            "#,
        )
        .bind(&encoded_value)
        .bind(finished_at.to_rfc3339())
        .bind(task_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        self.check_terminal_write(task_id, rows_affected).await
    }

    async fn mark_failure(
        &self,
        task_id: &str,
        error: String,
        traceback: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed', error_message = ?, traceback = ?, finished_at = ?
            WHERE task_id = ? AND status = 'reserved'
            "#,
        )
        .bind(&error)
        .bind(&traceback)
        .bind(finished_at.to_rfc3339())
        .bind(task_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        self.check_terminal_write(task_id, rows_affected).await
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, BackendError> {
        let row = sqlx::query(
            r#"
            SELECT status, result_value, error_message, traceback, created_at, started_at, finished_at
            FROM tasks WHERE task_id = ?
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_str: String = row.get("status");
        let status = str_to_status(&status_str)?;
        if !status.is_terminal() {
            return Ok(None);
        }

        let created_at: String = row.get("created_at");
        let started_at: Option<String> = row.get("started_at");
        let finished_at: Option<String> = row.get("finished_at");

        Ok(Some(TaskResult {
            task_id: task_id.to_string(),
            status,
            value: row.get("result_value"),
            error: row.get("error_message"),
            traceback: row.get("traceback"),
            enqueued_at: Some(parse_rfc3339(&created_at)?),
            started_at: started_at.as_deref().map(parse_rfc3339).transpose()?,
            finished_at: finished_at.as_deref().map(parse_rfc3339).transpose()?,
        }))
    }

    async fn recover_stuck_tasks(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Vec<String>, BackendError> {
        let cutoff = (Utc::now() - max_age).to_rfc3339();

        let rows = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', started_at = NULL
            WHERE status = 'reserved' AND started_at <= ?
            RETURNING task_id
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("task_id")).collect())
    }

    async fn maintenance(&self, retention: chrono::Duration) -> Result<usize, BackendError> {
        let cutoff = (Utc::now() - retention).to_rfc3339();

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('success', 'failed') AND finished_at <= ?
            "#,
        )
        .bind(&cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected as usize)
    }
}

impl SqliteBackend {
    async fn check_terminal_write(
        &self,
        task_id: &str,
        rows_affected: u64,
    ) -> Result<(), BackendError> {
        if rows_affected > 0 {
            return Ok(());
        }

        let row = sqlx::query("SELECT status FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let status_str: String = row.get("status");
                let status = str_to_status(&status_str)?;
                if status.is_terminal() {
                    Err(BackendError::AlreadyTerminal {
                        task_id: task_id.to_string(),
                        status: format!("{status:?}"),
                    })
                } else {
                    Err(BackendError::NotReserved {
                        task_id: task_id.to_string(),
                        status: format!("{status:?}"),
                    })
                }
            }
            None => Err(BackendError::TaskNotFound(task_id.to_string())),
        }
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, BackendError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BackendError::storage("parse_timestamp", None, std::io::Error::other(e)))
}
