//! Model Executor Bridge.
//!
//! Runs a blocking scoring function off the coordinator's task and relays
//! its progress through an ordered channel. The coordinator drains events
//! one at a time with a bounded wait; the computation owns producing, the
//! coordinator owns persisting.
//!
//! A timeout cancels the coordinator's wait only — the blocking task is
//! not aborted and may run to completion in the background. Once the
//! handle is dropped the channel closes and any late sends are discarded.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::JobError;
use crate::models::{LogSink, RunFn};

/// Backpressure bound on in-flight progress lines.
const CHANNEL_CAPACITY: usize = 64;

/// One message from the executing model.
#[derive(Debug)]
pub enum ExecutorEvent {
    /// A progress line to persist. Delivered in emission order.
    Log(String),
    /// The terminal outcome. Always the last event for a run.
    Done(Result<f64, String>),
}

/// Receiving side of a spawned model run.
pub struct ExecutionHandle {
    rx: mpsc::Receiver<ExecutorEvent>,
}

/// Start `run` on a fresh blocking task and return the event stream.
///
/// Panics inside the run function are caught and surfaced as a failed
/// terminal event; nothing propagates out of the bridge.
pub fn spawn(run: RunFn, temperature: f64, question: String) -> ExecutionHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let log_tx = tx.clone();
        let sink: LogSink = Box::new(move |line| {
            // Receiver gone means the coordinator gave up on this run.
            let _ = log_tx.blocking_send(ExecutorEvent::Log(line));
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| run(temperature, &question, &sink)));
        let terminal = match outcome {
            Ok(Ok(p)) => Ok(p),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(panic.as_ref())),
        };
        let _ = tx.blocking_send(ExecutorEvent::Done(terminal));
    });

    ExecutionHandle { rx }
}

impl ExecutionHandle {
    /// Wait for the next event, up to `timeout`.
    ///
    /// The timeout applies per message, not to the whole run: a model that
    /// keeps logging keeps its job alive.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<ExecutorEvent, JobError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(JobError::ExecutionException {
                detail: "model task ended without a terminal result".into(),
            }),
            Err(_) => Err(JobError::ExecutionTimeout { timeout }),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("model panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("model panicked: {s}")
    } else {
        "model panicked".to_string()
    }
}
