//! Cost policy and demo-quota tracking.

use std::time::Duration;

use chrono::Utc;

use crate::error::{DatabaseError, JobError};
use crate::store::Database;

/// A job runs in demo (free, restricted) mode when the requester cannot
/// afford the model.
pub fn is_demo(balance: i64, cost: i64) -> bool {
    balance < cost
}

/// Free completions inside the trailing window ending now.
///
/// Advisory only: consistent with whatever snapshot the store gives us,
/// not transactional against concurrent workers.
pub async fn recent_free_completions(
    db: &dyn Database,
    window: Duration,
) -> Result<u64, DatabaseError> {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(1));
    db.count_free_completions_since(Utc::now() - window).await
}

/// Gate a demo-mode run: the model must be demo-eligible and the rolling
/// free-use count must not have passed the cap. Billable runs always pass.
///
/// The comparison is strictly greater-than: the cap'th observed free use
/// still runs, cap+1 trips the gate.
pub fn check_demo_gate(
    model: &str,
    demo_supported: bool,
    demo: bool,
    used: u64,
    cap: u64,
) -> Result<(), JobError> {
    if !demo {
        return Ok(());
    }
    if !demo_supported {
        return Err(JobError::DemoUnsupportedForModel {
            model: model.to_string(),
        });
    }
    if used > cap {
        return Err(JobError::DemoQuotaExceeded { used, max: cap });
    }
    Ok(())
}
