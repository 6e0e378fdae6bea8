//! Built-in reference scoring models.
//!
//! Local heuristics standing behind the same registry boundary a remote
//! LLM scorer would use: blocking run functions that stream their
//! reasoning to the log sink and return a probability.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{LogSink, ModelRegistry, ModelSpec};

/// Single-pass heuristic scorer. Cheap, demo-eligible.
pub const BASELINE: &str = "baseline";

/// Multi-pass jittered scorer. Billable only.
pub const ENSEMBLE: &str = "ensemble";

const BASELINE_COST: i64 = 1;
const ENSEMBLE_COST: i64 = 100;
const ENSEMBLE_PASSES: usize = 5;

/// Register the built-in models.
pub fn register(registry: &mut ModelRegistry) {
    registry.register(
        BASELINE,
        ModelSpec {
            cost: BASELINE_COST,
            demo_supported: true,
            run: Arc::new(|temperature, question, sink| {
                run_baseline(temperature, question, sink)
            }),
        },
    );
    registry.register(
        ENSEMBLE,
        ModelSpec {
            cost: ENSEMBLE_COST,
            demo_supported: false,
            run: Arc::new(|temperature, question, sink| {
                run_ensemble(temperature, question, sink)
            }),
        },
    );
}

fn run_baseline(temperature: f64, question: &str, sink: &LogSink) -> anyhow::Result<f64> {
    sink(format!("Scoring question: {question}"));

    let base = base_rate(question);
    sink(format!("Base rate from question features: {base:.3}"));

    let adjustment = keyword_adjustment(question);
    sink(format!("Keyword adjustment: {adjustment:+.3}"));

    // Temperature pulls the estimate toward maximum uncertainty (0.5).
    let raw = (base + adjustment).clamp(0.01, 0.99);
    let p = raw * (1.0 - temperature) + 0.5 * temperature;
    sink(format!("Final probability: {p:.3}"));

    Ok(p)
}

fn run_ensemble(temperature: f64, question: &str, sink: &LogSink) -> anyhow::Result<f64> {
    sink(format!(
        "Running {ENSEMBLE_PASSES}-pass ensemble on: {question}"
    ));

    // Seed from the question so repeated runs of the same job agree.
    let mut rng = StdRng::seed_from_u64(question_seed(question));
    let mut total = 0.0;

    for pass in 1..=ENSEMBLE_PASSES {
        let jitter: f64 = rng.gen_range(-0.1..0.1) * (0.5 + temperature);
        let jittered_temp = (temperature + jitter.abs() * 0.5).clamp(0.0, 1.0);
        let quiet: LogSink = Box::new(|_| {});
        let p = run_baseline(jittered_temp, question, &quiet)?;
        let p = (p + jitter).clamp(0.01, 0.99);
        sink(format!("Pass {pass}/{ENSEMBLE_PASSES}: {p:.3}"));
        total += p;
    }

    let p = total / ENSEMBLE_PASSES as f64;
    sink(format!("Ensemble mean: {p:.3}"));
    Ok(p)
}

/// Stable pseudo-base-rate derived from the question text.
fn base_rate(question: &str) -> f64 {
    0.2 + 0.6 * (question_seed(question) % 1000) as f64 / 1000.0
}

fn question_seed(question: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    question.trim().to_lowercase().hash(&mut hasher);
    hasher.finish()
}

/// Shift the estimate for strongly-loaded phrasing.
fn keyword_adjustment(question: &str) -> f64 {
    let lower = question.to_lowercase();
    let mut adjustment: f64 = 0.0;
    for word in ["never", "impossible", "all ", "every ", "everyone"] {
        if lower.contains(word) {
            adjustment -= 0.08;
        }
    }
    for word in ["ever", "at least once", "any ", "some "] {
        if lower.contains(word) {
            adjustment += 0.05;
        }
    }
    adjustment.clamp(-0.25, 0.25)
}
