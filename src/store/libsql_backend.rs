//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 TEXT and normalized through `datetime()` in window queries.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::model::{Job, JobLogEntry, JobState, NewJob, PendingJob, User};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Job column list shared by every job query.
///
/// 0:id, 1:user_id, 2:question, 3:model_name, 4:model_temperature,
/// 5:public, 6:state, 7:result_probability, 8:error_message,
/// 9:credit_cost, 10:created_at
const JOB_COLUMNS: &str = "id, user_id, question, model_name, model_temperature, \
     public, state, result_probability, error_message, credit_cost, created_at";

/// Map a libsql row (in JOB_COLUMNS order) to a Job.
fn row_to_job(row: &libsql::Row) -> Result<Job, libsql::Error> {
    let id_str: String = row.get(0)?;
    let state_str: String = row.get(6)?;
    let created_str: String = row.get(10)?;

    Ok(Job {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1)?,
        question: row.get(2)?,
        model_name: row.get(3)?,
        model_temperature: row.get(4)?,
        is_public: row.get::<i64>(5)? != 0,
        state: JobState::from_str_lossy(&state_str),
        result_probability: row.get::<f64>(7).ok(),
        error_message: row.get::<String>(8).ok(),
        credit_cost: row.get::<i64>(9).ok(),
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn upsert_user(&self, id: &str, credits: i64) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (id, credits, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET credits = ?2, updated_at = ?3",
                params![id, credits, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_user: {e}")))?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT id, credits FROM users WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(User {
                id: row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_user row: {e}")))?,
                credits: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("get_user row: {e}")))?,
            })),
            _ => Ok(None),
        }
    }

    async fn debit_credits(&self, user_id: &str, amount: i64) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        // Atomic decrement in SQL; correct under concurrent workers.
        let affected = self
            .conn()
            .execute(
                "UPDATE users SET credits = credits - ?1, updated_at = ?2 WHERE id = ?3",
                params![amount, now, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("debit_credits: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.into(),
            });
        }
        debug!(user_id, amount, "Debited credits");
        Ok(())
    }

    // ── Jobs ────────────────────────────────────────────────────────

    async fn insert_job(&self, job: &NewJob) -> Result<Job, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO prediction_jobs
                    (id, user_id, question, model_name, model_temperature, public,
                     state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
                params![
                    id.to_string(),
                    job.user_id.as_str(),
                    job.question.as_str(),
                    job.model_name.as_str(),
                    job.model_temperature,
                    job.is_public as i64,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_job: {e}")))?;

        debug!(job_id = %id, model = %job.model_name, "Job inserted");
        Ok(Job {
            id,
            user_id: job.user_id.clone(),
            question: job.question.clone(),
            model_name: job.model_name.clone(),
            model_temperature: job.model_temperature,
            is_public: job.is_public,
            state: JobState::Pending,
            result_probability: None,
            error_message: None,
            credit_cost: None,
            created_at: now,
        })
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM prediction_jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_job: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_job(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_job row: {e}"))),
            _ => Ok(None),
        }
    }

    async fn list_pending_jobs(&self) -> Result<Vec<PendingJob>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {}, u.credits FROM prediction_jobs j
                     JOIN users u ON u.id = j.user_id
                     WHERE j.state = 'pending'
                     ORDER BY j.created_at ASC",
                    JOB_COLUMNS
                        .split(", ")
                        .map(|c| format!("j.{c}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_pending_jobs: {e}")))?;

        let mut pending = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_job(&row) {
                Ok(job) => {
                    let credits: i64 = row
                        .get(11)
                        .map_err(|e| DatabaseError::Query(format!("list_pending_jobs row: {e}")))?;
                    let user = User {
                        id: job.user_id.clone(),
                        credits,
                    };
                    pending.push(PendingJob { job, user });
                }
                Err(e) => {
                    tracing::warn!("Skipping job row: {e}");
                }
            }
        }
        Ok(pending)
    }

    async fn reset_running_jobs(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE prediction_jobs SET state = 'pending', updated_at = ?1
                 WHERE state = 'running'",
                params![now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reset_running_jobs: {e}")))?;
        Ok(affected as usize)
    }

    async fn mark_job_running(&self, id: Uuid) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE prediction_jobs SET state = 'running', updated_at = ?1 WHERE id = ?2",
                params![now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_job_running: {e}")))?;
        debug!(job_id = %id, "Job marked running");
        Ok(())
    }

    async fn mark_job_complete(
        &self,
        id: Uuid,
        probability: f64,
        credit_cost: i64,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE prediction_jobs
                 SET state = 'complete', result_probability = ?1, credit_cost = ?2,
                     error_message = NULL, updated_at = ?3
                 WHERE id = ?4",
                params![probability, credit_cost, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_job_complete: {e}")))?;
        debug!(job_id = %id, probability, credit_cost, "Job marked complete");
        Ok(())
    }

    async fn mark_job_error(&self, id: Uuid, message: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE prediction_jobs
                 SET state = 'error', error_message = ?1, result_probability = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![message, now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_job_error: {e}")))?;
        debug!(job_id = %id, message, "Job marked error");
        Ok(())
    }

    async fn count_free_completions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM prediction_jobs
                 WHERE state = 'complete' AND credit_cost = 0
                   AND datetime(created_at) >= datetime(?1)",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_free_completions_since: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(|e| {
                    DatabaseError::Query(format!("count_free_completions_since row: {e}"))
                })?;
                Ok(count.max(0) as u64)
            }
            _ => Ok(0),
        }
    }

    // ── Job logs ────────────────────────────────────────────────────

    async fn append_job_log(&self, job_id: Uuid, text: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO prediction_job_logs (job_id, log_text, created_at)
                 VALUES (?1, ?2, ?3)",
                params![job_id.to_string(), text, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_job_log: {e}")))?;
        Ok(())
    }

    async fn list_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLogEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, job_id, log_text, created_at FROM prediction_job_logs
                 WHERE job_id = ?1 ORDER BY id ASC",
                params![job_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_job_logs: {e}")))?;

        let mut logs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_job_logs row: {e}")))?;
            let job_id_str: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("list_job_logs row: {e}")))?;
            let log_text: String = row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("list_job_logs row: {e}")))?;
            let created_str: String = row
                .get(3)
                .map_err(|e| DatabaseError::Query(format!("list_job_logs row: {e}")))?;

            logs.push(JobLogEntry {
                id,
                job_id: Uuid::parse_str(&job_id_str).unwrap_or_else(|_| Uuid::nil()),
                log_text,
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(logs)
    }
}
