//! Configuration types.

use std::time::Duration;

use tracing::warn;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between poll cycles.
    pub poll_interval: Duration,
    /// Maximum wait for the next message from a running model.
    pub executor_timeout: Duration,
    /// Maximum free (demo) completions allowed per rolling window.
    pub max_daily_demo_uses: u64,
    /// Rolling window over which free completions are counted.
    pub demo_window: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            executor_timeout: Duration::from_secs(300), // 5 minutes
            max_daily_demo_uses: 100,
            demo_window: Duration::from_secs(24 * 3600), // 24 hours
        }
    }
}

impl WorkerConfig {
    /// Build config from environment variables, falling back to defaults
    /// (with a warning) on missing or unparsable values.
    ///
    /// - `WORKER_POLL_INTERVAL_SECS`
    /// - `MODEL_TIMEOUT_SECS`
    /// - `MAX_DAILY_DEMO_USES`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_secs(env_u64(
                "WORKER_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            executor_timeout: Duration::from_secs(env_u64(
                "MODEL_TIMEOUT_SECS",
                defaults.executor_timeout.as_secs(),
            )),
            max_daily_demo_uses: env_u64("MAX_DAILY_DEMO_USES", defaults.max_daily_demo_uses),
            demo_window: defaults.demo_window,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default, "Unparsable env var, using default");
            default
        }),
        Err(_) => default,
    }
}
