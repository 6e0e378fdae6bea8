//! Forecast Worker — single-consumer prediction job engine.
//!
//! Polls the job store for pending prediction requests, runs each against
//! a registered scoring model, streams progress lines back to the store,
//! and commits exactly one terminal result per job.

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod store;
