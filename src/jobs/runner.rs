//! Job state machine — drives one job from pickup to its terminal state.
//!
//! Every failure along the way is terminal for the job and lands in its
//! `error_message`; store failures are the only errors that escape to the
//! caller. A job is marked running before anything else so concurrent
//! observers stop considering it for pickup.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::{DatabaseError, JobError};
use crate::jobs::executor::{self, ExecutorEvent};
use crate::jobs::model::{Job, User};
use crate::jobs::policy;
use crate::models::ModelRegistry;
use crate::models::validation::QuestionValidator;
use crate::store::Database;

/// Everything the runner (and poll loop) needs, wired once at startup.
pub struct RunnerDeps {
    pub db: Arc<dyn Database>,
    pub registry: Arc<ModelRegistry>,
    pub validator: Arc<dyn QuestionValidator>,
    pub config: WorkerConfig,
}

/// How one job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed { probability: f64, charged: i64 },
    Failed(JobError),
}

/// Process a single pending job to its terminal state.
///
/// `user` is the balance snapshot fetched alongside the job; it is not
/// assumed fresh beyond this call.
pub async fn process_job(
    deps: &RunnerDeps,
    user: &User,
    job: &Job,
) -> Result<JobOutcome, DatabaseError> {
    info!(
        job_id = %job.id,
        user_id = %user.id,
        credits = user.credits,
        question = %job.question,
        "Picked up job"
    );
    deps.db.mark_job_running(job.id).await?;

    let spec = match deps.registry.get(&job.model_name) {
        Ok(spec) => spec,
        Err(e) => return fail(deps, job, e).await,
    };

    let demo = policy::is_demo(user.credits, spec.cost);
    let demo_uses = policy::recent_free_completions(deps.db.as_ref(), deps.config.demo_window).await?;
    info!(
        job_id = %job.id,
        model = %job.model_name,
        cost = spec.cost,
        demo,
        demo_uses,
        max_demo_uses = deps.config.max_daily_demo_uses,
        "Running job"
    );

    if let Err(e) = policy::check_demo_gate(
        &job.model_name,
        spec.demo_supported,
        demo,
        demo_uses,
        deps.config.max_daily_demo_uses,
    ) {
        return fail(deps, job, e).await;
    }

    let verdict = match deps.validator.validate(&job.question) {
        Ok(verdict) => verdict,
        Err(e) => {
            return fail(
                deps,
                job,
                JobError::ValidationException {
                    detail: e.to_string(),
                },
            )
            .await;
        }
    };
    if verdict.is_invalid {
        return fail(
            deps,
            job,
            JobError::ValidationRejected {
                reason: verdict.explanation,
            },
        )
        .await;
    }

    let mut handle = executor::spawn(
        spec.run.clone(),
        job.normalized_temperature(),
        job.question.clone(),
    );
    let probability = loop {
        match handle.next_event(deps.config.executor_timeout).await {
            Ok(ExecutorEvent::Log(line)) => deps.db.append_job_log(job.id, &line).await?,
            Ok(ExecutorEvent::Done(Ok(p))) => break p,
            Ok(ExecutorEvent::Done(Err(detail))) => {
                return fail(deps, job, JobError::ExecutionException { detail }).await;
            }
            Err(e) => return fail(deps, job, e).await,
        }
    };

    let charged = if demo { 0 } else { spec.cost };
    deps.db.mark_job_complete(job.id, probability, charged).await?;
    if !demo {
        deps.db.debit_credits(&user.id, spec.cost).await?;
    }

    info!(job_id = %job.id, probability, charged, "Job complete");
    Ok(JobOutcome::Completed { probability, charged })
}

/// Record a terminal failure on the job.
async fn fail(deps: &RunnerDeps, job: &Job, err: JobError) -> Result<JobOutcome, DatabaseError> {
    warn!(job_id = %job.id, error = %err, "Job failed");
    deps.db.mark_job_error(job.id, &err.to_string()).await?;
    Ok(JobOutcome::Failed(err))
}
