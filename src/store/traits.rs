//! Unified `Database` trait — single async interface for all persistence.
//!
//! Every operation is atomic at the single-record level; the worker never
//! needs a multi-record transaction. Balance mutation is an atomic
//! decrement executed by the store, never a read-modify-write in
//! application code, so concurrent worker instances cannot lose updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::model::{Job, JobLogEntry, NewJob, PendingJob, User};

/// Backend-agnostic database trait covering jobs, job logs, and users.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a user, or replace their credit balance if they exist.
    async fn upsert_user(&self, id: &str, credits: i64) -> Result<(), DatabaseError>;

    /// Get a user by ID.
    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError>;

    /// Atomically subtract `amount` from a user's credit balance.
    async fn debit_credits(&self, user_id: &str, amount: i64) -> Result<(), DatabaseError>;

    // ── Jobs ────────────────────────────────────────────────────────

    /// Insert a new pending job. The worker itself never calls this; it
    /// exists for the job-creating surfaces and for tests.
    async fn insert_job(&self, job: &NewJob) -> Result<Job, DatabaseError>;

    /// Get a job by ID.
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    /// All pending jobs joined with their owning user, oldest first.
    /// Never returns jobs in a terminal state.
    async fn list_pending_jobs(&self) -> Result<Vec<PendingJob>, DatabaseError>;

    /// Reset every running job back to pending (startup crash recovery).
    /// Returns the number of jobs reset.
    async fn reset_running_jobs(&self) -> Result<usize, DatabaseError>;

    /// Transition a job to running.
    async fn mark_job_running(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Transition a job to complete with its result probability and the
    /// credits actually charged (0 for demo runs).
    async fn mark_job_complete(
        &self,
        id: Uuid,
        probability: f64,
        credit_cost: i64,
    ) -> Result<(), DatabaseError>;

    /// Transition a job to error with a human-readable message.
    async fn mark_job_error(&self, id: Uuid, message: &str) -> Result<(), DatabaseError>;

    /// Count completed free-of-charge jobs created at or after `cutoff`.
    /// This backs the rolling demo quota.
    async fn count_free_completions_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    // ── Job logs ────────────────────────────────────────────────────

    /// Append a progress line to a job's log.
    async fn append_job_log(&self, job_id: Uuid, text: &str) -> Result<(), DatabaseError>;

    /// All log lines for a job, in emission order.
    async fn list_job_logs(&self, job_id: Uuid) -> Result<Vec<JobLogEntry>, DatabaseError>;
}
