//! End-to-end worker tests: seed the store, run poll cycles, and check
//! terminal states, balances, and log order through the public API.

use std::sync::Arc;
use std::time::Duration;

use forecast_worker::config::WorkerConfig;
use forecast_worker::jobs::model::{JobState, NewJob};
use forecast_worker::jobs::poll;
use forecast_worker::jobs::runner::RunnerDeps;
use forecast_worker::models::validation::RuleValidator;
use forecast_worker::models::{ModelRegistry, ModelSpec, RunFn, builtin};
use forecast_worker::store::{Database, LibSqlBackend};
use tokio::sync::watch;

async fn worker_deps(config: WorkerConfig) -> Arc<RunnerDeps> {
    let mut registry = ModelRegistry::with_builtin_models();

    // A deliberately slow model for timeout coverage.
    let stall: RunFn = Arc::new(|_, _, _| {
        std::thread::sleep(Duration::from_secs(3));
        Ok(0.5)
    });
    registry.register(
        "stall",
        ModelSpec {
            cost: 1,
            demo_supported: true,
            run: stall,
        },
    );

    Arc::new(RunnerDeps {
        db: Arc::new(LibSqlBackend::new_memory().await.unwrap()),
        registry: Arc::new(registry),
        validator: Arc::new(RuleValidator),
        config,
    })
}

async fn seed_job(deps: &RunnerDeps, user: &str, model: &str, question: &str) -> uuid::Uuid {
    deps.db
        .insert_job(&NewJob {
            user_id: user.into(),
            question: question.into(),
            model_name: model.into(),
            model_temperature: 30,
            is_public: false,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn mixed_batch_reaches_consistent_terminal_states() {
    let deps = worker_deps(WorkerConfig {
        executor_timeout: Duration::from_millis(100),
        ..WorkerConfig::default()
    })
    .await;
    let db = &deps.db;

    db.upsert_user("rich", 500).await.unwrap();
    db.upsert_user("poor", 0).await.unwrap();

    let billed = seed_job(&deps, "rich", builtin::ENSEMBLE, "Will markets rise this quarter?").await;
    let demo = seed_job(&deps, "poor", builtin::BASELINE, "Will it snow in Lima this year?").await;
    let unknown = seed_job(&deps, "rich", "gpt-12", "Will anything use this model?").await;
    let rejected = seed_job(&deps, "rich", builtin::BASELINE, "tell me the future").await;
    let stalled = seed_job(&deps, "rich", "stall", "Will this finish in time?").await;

    let (_tx, rx) = watch::channel(false);
    poll::run_poll_cycle(&deps, &rx).await;

    // Billable completion: cost recorded, balance debited exactly once.
    let job = db.get_job(billed).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.credit_cost, Some(100));
    assert!(job.result_probability.is_some());
    assert!(job.error_message.is_none());

    // Demo completion: free, balance untouched.
    let job = db.get_job(demo).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Complete);
    assert_eq!(job.credit_cost, Some(0));
    assert_eq!(db.get_user("poor").await.unwrap().unwrap().credits, 0);

    // Unknown model names the model in its error.
    let job = db.get_job(unknown).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Error);
    assert!(job.error_message.unwrap().contains("gpt-12"));
    assert!(job.result_probability.is_none());

    // Validation rejection.
    let job = db.get_job(rejected).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Error);

    // Timeout.
    let job = db.get_job(stalled).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Error);
    assert!(job.error_message.unwrap().contains("timed out"));

    // rich paid only for the two billable runs that completed: ensemble
    // (100) + stall/unknown/rejected charged nothing.
    assert_eq!(db.get_user("rich").await.unwrap().unwrap().credits, 400);

    // Every job is terminal; the next fetch is empty.
    assert!(db.list_pending_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn every_terminal_job_has_exactly_one_outcome_field() {
    let deps = worker_deps(WorkerConfig::default()).await;
    let db = &deps.db;

    db.upsert_user("u", 50).await.unwrap();
    let completes = seed_job(&deps, "u", builtin::BASELINE, "Will this complete cleanly?").await;
    let errors = seed_job(&deps, "u", "missing-model", "Will this error out?").await;

    let (_tx, rx) = watch::channel(false);
    poll::run_poll_cycle(&deps, &rx).await;

    for id in [completes, errors] {
        let job = db.get_job(id).await.unwrap().unwrap();
        assert!(job.state.is_terminal(), "job {id} still {}", job.state);
        assert!(
            job.result_probability.is_some() ^ job.error_message.is_some(),
            "job {id} must have exactly one of result/error"
        );
        match job.state {
            JobState::Complete => assert!(job.result_probability.is_some()),
            JobState::Error => assert!(job.error_message.is_some()),
            other => panic!("unexpected state {other}"),
        }
    }
}

#[tokio::test]
async fn progress_lines_survive_in_order_across_cycles() {
    let deps = worker_deps(WorkerConfig::default()).await;
    let db = &deps.db;

    db.upsert_user("u", 1000).await.unwrap();
    let id = seed_job(&deps, "u", builtin::ENSEMBLE, "Will the ensemble log each pass?").await;

    let (_tx, rx) = watch::channel(false);
    poll::run_poll_cycle(&deps, &rx).await;

    let logs = db.list_job_logs(id).await.unwrap();
    assert!(logs.len() >= 7); // header + 5 passes + mean
    let pass_lines: Vec<_> = logs
        .iter()
        .filter(|l| l.log_text.starts_with("Pass "))
        .map(|l| l.log_text.clone())
        .collect();
    for (i, line) in pass_lines.iter().enumerate() {
        assert!(
            line.starts_with(&format!("Pass {}/", i + 1)),
            "passes out of order: {line}"
        );
    }

    // A second cycle leaves the log untouched.
    let before = logs.len();
    poll::run_poll_cycle(&deps, &rx).await;
    assert_eq!(db.list_job_logs(id).await.unwrap().len(), before);
}

#[tokio::test]
async fn orphaned_running_jobs_recover_on_startup() {
    let deps = worker_deps(WorkerConfig {
        poll_interval: Duration::from_millis(20),
        ..WorkerConfig::default()
    })
    .await;
    let db = &deps.db;

    db.upsert_user("u", 100).await.unwrap();
    let id = seed_job(&deps, "u", builtin::BASELINE, "Will the orphan be rescued?").await;
    // Simulate a crash mid-flight
    db.mark_job_running(id).await.unwrap();

    let (tx, rx) = watch::channel(false);
    let handle = poll::spawn_poll_loop(Arc::clone(&deps), rx);

    // Wait for the startup reset + first cycle to finish the job
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = db.get_job(id).await.unwrap().unwrap();
        if job.state.is_terminal() {
            assert_eq!(job.state, JobState::Complete);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "orphaned job was never recovered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tx.send(true).unwrap();
    handle.await.unwrap();
}
