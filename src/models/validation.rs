//! Question validation collaborator.
//!
//! The runner treats the validator as an external service that can reject
//! a question (with an explanation) or fail outright; both outcomes are
//! terminal for the job.

use regex::Regex;
use std::sync::OnceLock;

/// Outcome of validating a question.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// True if the question was rejected.
    pub is_invalid: bool,
    /// Human-readable explanation when rejected, empty otherwise.
    pub explanation: String,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            is_invalid: false,
            explanation: String::new(),
        }
    }

    pub fn invalid(explanation: impl Into<String>) -> Self {
        Self {
            is_invalid: true,
            explanation: explanation.into(),
        }
    }
}

/// Pluggable question validator.
pub trait QuestionValidator: Send + Sync {
    /// Validate a question. `Err` means the validator itself failed
    /// (distinct from a rejection).
    fn validate(&self, question: &str) -> anyhow::Result<Verdict>;
}

/// Maximum accepted question length, in characters.
const MAX_QUESTION_CHARS: usize = 500;

/// Rule-based validator: the question must be a non-empty, reasonably
/// sized yes/no forecasting question.
#[derive(Debug, Default)]
pub struct RuleValidator;

fn question_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Yes/no forecasting phrasing: "Will ...?", "Is ... going to ...?", etc.
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(will|is|are|does|do|can|could|would|shall)\b.*\?\s*$")
            .expect("question shape regex is valid")
    })
}

impl QuestionValidator for RuleValidator {
    fn validate(&self, question: &str) -> anyhow::Result<Verdict> {
        let trimmed = question.trim();

        if trimmed.is_empty() {
            return Ok(Verdict::invalid("Question is empty."));
        }
        if trimmed.chars().count() > MAX_QUESTION_CHARS {
            return Ok(Verdict::invalid(format!(
                "Question is too long ({} characters, max {MAX_QUESTION_CHARS}).",
                trimmed.chars().count()
            )));
        }
        if !trimmed.ends_with('?') {
            return Ok(Verdict::invalid("Question must end with a question mark."));
        }
        if !question_shape().is_match(trimmed) {
            return Ok(Verdict::invalid(
                "Question must be phrased as a yes/no forecasting question, e.g. \"Will X happen by Y?\".",
            ));
        }

        Ok(Verdict::valid())
    }
}
