use std::path::Path;
use std::sync::Arc;

use gfperf::{Application, RunOutcome};
use gfperf_core::config::{BenchOptions, GroupMap, StressWorkloadConfig};
use gfperf_core::{AppConfig, CapturedOutput, Console};
use sqlx::SqlitePool;
use tempfile::TempDir;

const WRAPPER: &str = r#"
key=$1
prog=$2
case "$prog" in
    gfperf-metadata)
        echo "metadata/libgfarm/create = 100 ops" ;;
    gfperf-tree)
        echo "tree failed" 1>&2
        exit 1 ;;
esac
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    format!("/bin/sh {}", path.display())
}

fn sweep_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.path().join("gfperf.db").display());
    config.database.backup_path = Some(dir.path().join("gfperf.db.bak").display().to_string());
    config.classifier.error_log = Some(dir.path().join("gfperf-error.log"));

    let mut single = GroupMap::new();
    single.insert("metadata".to_string(), vec![BenchOptions::new()]);
    single.insert("tree".to_string(), vec![BenchOptions::new()]);

    config.sweep.authentication = vec!["sharedsecret".to_string()];
    config.sweep.wrapper = write_script(dir.path(), "gfperf-wrapper.sh", WRAPPER);
    config.sweep.precheck_command = None;
    config.sweep.start_offset_seconds = 0;
    config.sweep.single = single;
    config
}

fn application(config: AppConfig) -> (Application, CapturedOutput) {
    let (console, captured) = Console::captured();
    (Application::new(config, Arc::new(console)), captured)
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sweep_persists_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = sweep_config(&dir);
    let url = config.database.url.clone();
    let (app, captured) = application(config);

    let outcome = app.run_sweep().await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(app.context().error_count(), 1);
    assert!(captured.contents().contains("[ERROR] tree failed"));

    let pool = SqlitePool::connect(&url).await.unwrap();
    let key: String = sqlx::query_scalar("SELECT key FROM data")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(key, "sharedsecret/metadata/libgfarm/create");

    assert_eq!(count(&pool, "statistics").await, 1);
    assert_eq!(count(&pool, "error_msg").await, 1);
    assert_eq!(count(&pool, "execute_time").await, 1);

    let errors: i64 = sqlx::query_scalar("SELECT count FROM error")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(errors, 1);

    assert!(dir.path().join("gfperf.db.bak").exists());
    let log = std::fs::read_to_string(dir.path().join("gfperf-error.log")).unwrap();
    assert!(log.contains("tree failed"));
}

#[tokio::test]
async fn test_failed_precheck_skips_benchmarks() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sweep_config(&dir);
    config.sweep.precheck_command = Some(write_script(
        dir.path(),
        "gfsched.sh",
        "echo 'gfsched: no filesystem node' 1>&2\n",
    ));
    let url = config.database.url.clone();
    let (app, captured) = application(config);

    let outcome = app.run_sweep().await.unwrap();
    assert_eq!(outcome, RunOutcome::PrecheckFailed);
    assert!(captured.contents().contains("[ERROR] gfsched: no filesystem node"));
    assert!(!captured.contents().contains("gfperf-metadata"));

    let pool = SqlitePool::connect(&url).await.unwrap();
    assert_eq!(count(&pool, "data").await, 0);
    assert_eq!(count(&pool, "statistics").await, 0);
    assert_eq!(count(&pool, "error").await, 1);
    assert_eq!(count(&pool, "execute_time").await, 1);
    assert!(dir.path().join("gfperf.db.bak").exists());
}

#[tokio::test]
async fn test_stress_runs_until_timeout() {
    let mut config = AppConfig::default();
    config.stress.commands = vec!["sleep 0.2".to_string(), "true".to_string()];
    config.stress.multiplex = 2;
    config.stress.timeout_seconds = 1;
    let (app, captured) = application(config);

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(15), app.run_stress())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let output = captured.contents();
    assert!(output.starts_with("start at "));
    assert!(output.contains("timeout: 1 seconds"));
    assert!(output.trim_end().lines().last().unwrap().starts_with("stop at "));
    assert_eq!(app.context().error_count(), 0);
}

#[tokio::test]
async fn test_stress_without_commands_is_an_error() {
    let (app, _) = application(AppConfig::default());
    assert!(app.run_stress().await.is_err());
}

#[tokio::test]
async fn test_stress_workload_without_gfsd_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.stress.workload = Some(StressWorkloadConfig {
        localdir: dir.path().display().to_string(),
        host_command: write_script(dir.path(), "gfsched.sh", "true\n"),
        ..Default::default()
    });
    let (app, captured) = application(config);

    let err = app.run_stress().await.unwrap_err();
    assert!(format!("{err:#}").contains("no gfsd!"));
    assert!(!captured.contents().contains("start at"));
}
