use chrono::{Duration, TimeZone, Utc};
use gfperf_core::config::DatabaseConfig;
use gfperf_core::models::parse_measurements;
use gfperf_core::MetricsRepository;
use gfperf_infrastructure::DatabaseManager;

const FIRST_RUN: &str = "\
gsi/metadata/libgfarm/create = 100 ops
gsi/read/1G = 40 bytes/sec 20 sec
";

const SECOND_RUN: &str = "\
gsi/metadata/libgfarm/create = 300 ops
gsi/read/1G = 60 bytes/sec 10 sec
not a result line
";

#[tokio::test]
async fn test_statistics_roll_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("gfperf.db").display()),
        statistics_window: "7 days".to_string(),
        ..Default::default()
    };
    let window = config.statistics_window().unwrap();

    let manager = DatabaseManager::new(&config).await.unwrap();
    manager.migrate().await.unwrap();
    let repo = manager.metrics_repository();

    let first = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let second = first + Duration::days(1);

    for (at, text) in [(first, FIRST_RUN), (second, SECOND_RUN)] {
        repo.insert_measurements(&parse_measurements(text, at))
            .await
            .unwrap();
        repo.compute_statistics(at, window).await.unwrap();
        repo.insert_execution_window(at, at + Duration::minutes(10))
            .await
            .unwrap();
    }

    let latest: Vec<(String, f64, f64)> = sqlx::query_as(
        "SELECT key, avr, stddev FROM statistics WHERE date = $1 ORDER BY key",
    )
    .bind(second.timestamp())
    .fetch_all(manager.pool())
    .await
    .unwrap();

    assert_eq!(
        latest,
        vec![
            ("gsi/metadata/libgfarm/create".to_string(), 200.0, 100.0),
            ("gsi/read/1G".to_string(), 50.0, 10.0),
        ]
    );

    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM execute_time")
        .fetch_one(manager.pool())
        .await
        .unwrap();
    assert_eq!(runs, 2);
}

#[tokio::test]
async fn test_reopen_keeps_existing_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("gfperf.db").display()),
        ..Default::default()
    };
    let now = Utc::now();

    {
        let manager = DatabaseManager::new(&config).await.unwrap();
        manager.migrate().await.unwrap();
        manager
            .metrics_repository()
            .insert_error_record(now, 2)
            .await
            .unwrap();
        manager.close().await;
    }

    let manager = DatabaseManager::new(&config).await.unwrap();
    manager.migrate().await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT count FROM error")
        .fetch_one(manager.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}
