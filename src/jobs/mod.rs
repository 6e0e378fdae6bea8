//! Job execution engine: data model, cost/quota policy, executor bridge,
//! state machine, and the poll loop.

pub mod executor;
pub mod model;
pub mod policy;
pub mod poll;
pub mod runner;

pub use model::{Job, JobLogEntry, JobState, NewJob, PendingJob, User};
pub use runner::{JobOutcome, RunnerDeps};
