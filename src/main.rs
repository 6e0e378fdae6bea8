use std::sync::Arc;

use forecast_worker::config::WorkerConfig;
use forecast_worker::jobs::poll;
use forecast_worker::jobs::runner::RunnerDeps;
use forecast_worker::models::ModelRegistry;
use forecast_worker::models::validation::RuleValidator;
use forecast_worker::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WorkerConfig::from_env();
    let db_path =
        std::env::var("FORECAST_DB_PATH").unwrap_or_else(|_| "./data/forecast.db".to_string());

    eprintln!("🔮 Forecast Worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {db_path}");
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());
    eprintln!("   Model timeout: {}s", config.executor_timeout.as_secs());
    eprintln!("   Daily demo cap: {}", config.max_daily_demo_uses);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {db_path}: {e}");
                std::process::exit(1);
            }),
    );

    // ── Models ───────────────────────────────────────────────────────────
    let registry = Arc::new(ModelRegistry::with_builtin_models());
    eprintln!("   Models: {}\n", registry.names().join(", "));

    let deps = Arc::new(RunnerDeps {
        db,
        registry,
        validator: Arc::new(RuleValidator),
        config,
    });

    // ── Poll loop + shutdown ─────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let loop_handle = poll::spawn_poll_loop(deps, shutdown_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, finishing in-flight work");
    let _ = shutdown_tx.send(true);
    loop_handle.await?;

    Ok(())
}
