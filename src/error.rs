//! Error types for the forecast worker.

use std::time::Duration;

/// Top-level error type for the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Terminal per-job failures.
///
/// The `Display` string of each variant is exactly what gets persisted to
/// the job's `error_message` column, so wording here is user-visible.
/// None of these ever abort the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Model `{model}` is not supported.")]
    UnsupportedModel { model: String },

    #[error(
        "Model `{model}` is not supported in demo mode; switch models or buy credits and retry."
    )]
    DemoUnsupportedForModel { model: String },

    #[error(
        "The daily limit of {max} free predictions has run out; buy credits, switch models, or try again later."
    )]
    DemoQuotaExceeded { used: u64, max: u64 },

    #[error("{reason}")]
    ValidationRejected { reason: String },

    #[error("Exception during validation: {detail}")]
    ValidationException { detail: String },

    #[error("Exception: {detail}")]
    ExecutionException { detail: String },

    #[error("Model execution timed out after {}s", timeout.as_secs())]
    ExecutionTimeout { timeout: Duration },
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_error_messages_are_user_readable() {
        let e = JobError::UnsupportedModel {
            model: "gpt-9".into(),
        };
        assert_eq!(e.to_string(), "Model `gpt-9` is not supported.");

        let e = JobError::ExecutionTimeout {
            timeout: Duration::from_secs(300),
        };
        assert_eq!(e.to_string(), "Model execution timed out after 300s");

        let e = JobError::DemoQuotaExceeded { used: 101, max: 100 };
        assert!(e.to_string().contains("100 free predictions"));
    }

    #[test]
    fn validation_rejection_passes_explanation_through() {
        let e = JobError::ValidationRejected {
            reason: "Question must end with a question mark.".into(),
        };
        assert_eq!(e.to_string(), "Question must end with a question mark.");
    }
}
