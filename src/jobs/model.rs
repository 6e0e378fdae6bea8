//! Job data model and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a prediction job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting to be picked up.
    Pending,
    /// Job is currently executing.
    Running,
    /// Job finished with a result probability.
    Complete,
    /// Job failed with an error message.
    Error,
}

impl JobState {
    /// Check if this state allows transitioning to another state.
    ///
    /// `Running -> Pending` is the startup crash-recovery reset: a freshly
    /// restarted process has no in-flight jobs, so anything still marked
    /// running is an orphan from a previous run.
    pub fn can_transition_to(&self, target: JobState) -> bool {
        use JobState::*;

        matches!(
            (self, target),
            (Pending, Running) | (Running, Complete) | (Running, Error) | (Running, Pending)
        )
    }

    /// Check if this is a terminal state. Terminal jobs are never revisited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Parse the DB string form. Unknown strings map to `Pending`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "complete" => Self::Complete,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }

    /// The DB string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One prediction request moving through the pending→running→terminal
/// lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    pub question: String,
    pub model_name: String,
    /// Integer temperature on a 0–100 scale; normalized to [0, 1] at
    /// execution time.
    pub model_temperature: i64,
    /// Whether the result page is publicly visible (pass-through from the
    /// creating surface; the worker never reads it).
    pub is_public: bool,
    pub state: JobState,
    /// Set if and only if `state == Complete`.
    pub result_probability: Option<f64>,
    /// Set if and only if `state == Error`.
    pub error_message: Option<String>,
    /// Credits actually charged; 0 for demo-mode completions. Immutable
    /// once written.
    pub credit_cost: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Model temperature normalized to [0, 1].
    pub fn normalized_temperature(&self) -> f64 {
        (self.model_temperature as f64 / 100.0).clamp(0.0, 1.0)
    }
}

/// Fields for inserting a new job. Creation is done by external surfaces
/// (and tests); the worker only ever transitions existing jobs.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub question: String,
    pub model_name: String,
    pub model_temperature: i64,
    pub is_public: bool,
}

/// An append-only progress line attached to a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobLogEntry {
    /// Monotonic id assigned by the store; read-back order equals
    /// emission order.
    pub id: i64,
    pub job_id: Uuid,
    pub log_text: String,
    pub created_at: DateTime<Utc>,
}

/// The requester and credit holder.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub credits: i64,
}

/// A pending job joined with its owning user, as returned by the poll
/// fetch. The user snapshot is only valid for the duration of this job's
/// processing.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub job: Job,
    pub user: User,
}
