//! Scoring model registry.
//!
//! Models are registered once at startup and injected into the job runner;
//! nothing reads model configuration from ambient globals. A model is a
//! blocking run function plus its credit cost and demo eligibility.

pub mod builtin;
pub mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::JobError;

/// Sink for a model's streamed progress lines.
///
/// Called from the blocking execution context; each line is relayed to the
/// coordinator and persisted before the model finishes.
pub type LogSink = Box<dyn Fn(String) + Send + Sync>;

/// A blocking scoring function: normalized temperature in [0, 1], the
/// question, and a progress sink. Returns a probability in [0, 1].
pub type RunFn = Arc<dyn Fn(f64, &str, &LogSink) -> anyhow::Result<f64> + Send + Sync>;

/// One registered scoring model.
#[derive(Clone)]
pub struct ModelSpec {
    /// Credits charged for a billable run.
    pub cost: i64,
    /// Whether the model may run in the free demo path.
    pub demo_supported: bool,
    pub run: RunFn,
}

/// Immutable model table, built once at process start.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in scoring models.
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register a model under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, spec: ModelSpec) {
        self.models.insert(name.into(), spec);
    }

    /// Look up a model, failing with `UnsupportedModel` if absent.
    pub fn get(&self, name: &str) -> Result<&ModelSpec, JobError> {
        self.models.get(name).ok_or_else(|| JobError::UnsupportedModel {
            model: name.to_string(),
        })
    }

    /// Credit cost of a model.
    pub fn cost_of(&self, name: &str) -> Result<i64, JobError> {
        self.get(name).map(|spec| spec.cost)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered model names, for the startup banner.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
