//! Poll loop — fetches pending jobs and feeds them to the runner.
//!
//! One cycle: fetch every pending job with its owning user, process them
//! strictly sequentially, then sleep for the poll interval. A single
//! job's failure never aborts the batch or the process.
//!
//! On startup, resets any `running` jobs back to `pending` (no jobs
//! survive a restart — they'll be re-picked up on the first sweep).
//! Shutdown is cooperative: a watch flag checked between jobs and while
//! sleeping; an in-flight job always runs to its terminal state first.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::jobs::runner::{self, RunnerDeps};

/// Spawn the worker's poll loop. The first fetch happens immediately.
pub fn spawn_poll_loop(
    deps: Arc<RunnerDeps>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_poll_loop(deps, shutdown))
}

/// Run the poll loop until the shutdown flag flips.
pub async fn run_poll_loop(deps: Arc<RunnerDeps>, mut shutdown: watch::Receiver<bool>) {
    info!(
        interval_secs = deps.config.poll_interval.as_secs(),
        "Poll loop started"
    );

    // Crash recovery: anything still marked running is an orphan from a
    // previous process.
    match deps.db.reset_running_jobs().await {
        Ok(0) => {}
        Ok(count) => info!(count, "Reset orphaned running jobs to pending"),
        Err(e) => warn!(error = %e, "Failed to reset orphaned running jobs"),
    }

    loop {
        run_poll_cycle(&deps, &shutdown).await;

        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(deps.config.poll_interval) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Poll loop stopped");
}

/// Single cycle: fetch the pending batch and process it sequentially.
pub async fn run_poll_cycle(deps: &RunnerDeps, shutdown: &watch::Receiver<bool>) {
    let batch = match deps.db.list_pending_jobs().await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, "Failed to list pending jobs");
            return;
        }
    };

    if batch.is_empty() {
        debug!("No pending jobs");
        return;
    }
    info!(count = batch.len(), "Fetched pending jobs");

    for pending in batch {
        if *shutdown.borrow() {
            info!("Shutdown requested, leaving remaining jobs for the next run");
            return;
        }

        let (job, user) = (pending.job, pending.user);
        if let Err(e) = runner::process_job(deps, &user, &job).await {
            // Store failure mid-job; record a terminal error so the job
            // is not silently stranded, then keep the loop alive.
            warn!(job_id = %job.id, error = %e, "Store failure while processing job");
            if let Err(e2) = deps
                .db
                .mark_job_error(job.id, &format!("Exception: {e}"))
                .await
            {
                warn!(job_id = %job.id, error = %e2, "Failed to record job error");
            }
        }
    }
}
