use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gfperf_core::models::{ErrorMessage, Measurement, Statistic};
use gfperf_core::statistics::population_stats;
use gfperf_core::{BenchError, BenchResult, ErrorMessageSink, MetricsRepository};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

/// 基于SQLite的结果仓储
///
/// 所有时间列保存unix秒。
#[derive(Debug, Clone)]
pub struct SqliteMetricsRepository {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteMetricsRepository {
    pub fn new(pool: SqlitePool, path: PathBuf) -> Self {
        Self { pool, path }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MetricsRepository for SqliteMetricsRepository {
    #[instrument(skip(self, measurements), fields(count = measurements.len()))]
    async fn insert_measurements(&self, measurements: &[Measurement]) -> BenchResult<()> {
        let mut tx = self.pool.begin().await.map_err(BenchError::Database)?;

        for m in measurements {
            match (m.exec_time, &m.exec_unit) {
                (Some(exec_time), Some(exec_unit)) => {
                    sqlx::query(
                        "INSERT INTO data (date, key, val, unit, exec_time, exec_unit) VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .bind(m.timestamp.timestamp())
                    .bind(&m.key)
                    .bind(m.value)
                    .bind(&m.unit)
                    .bind(exec_time)
                    .bind(exec_unit)
                    .execute(&mut *tx)
                    .await
                    .map_err(BenchError::Database)?;
                }
                _ => {
                    sqlx::query("INSERT INTO data (date, key, val, unit) VALUES ($1, $2, $3, $4)")
                        .bind(m.timestamp.timestamp())
                        .bind(&m.key)
                        .bind(m.value)
                        .bind(&m.unit)
                        .execute(&mut *tx)
                        .await
                        .map_err(BenchError::Database)?;
                }
            }
        }

        tx.commit().await.map_err(BenchError::Database)?;
        debug!("写入测量值: {} 条", measurements.len());
        Ok(())
    }

    #[instrument(skip(self), fields(now = %now.timestamp()))]
    async fn compute_statistics(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> BenchResult<Vec<Statistic>> {
        // 窗口超出时间范围时统计全部数据
        let since = now
            .checked_sub_signed(window)
            .map_or(i64::MIN, |t| t.timestamp());
        let mut tx = self.pool.begin().await.map_err(BenchError::Database)?;

        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM data GROUP BY key")
            .fetch_all(&mut *tx)
            .await
            .map_err(BenchError::Database)?;

        let mut written = Vec::new();
        for key in keys {
            let values: Vec<f64> =
                sqlx::query_scalar("SELECT val FROM data WHERE key = $1 AND date > $2")
                    .bind(&key)
                    .bind(since)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(BenchError::Database)?;

            let Some(stats) = population_stats(&values) else {
                continue;
            };

            sqlx::query("INSERT INTO statistics (date, key, avr, stddev) VALUES ($1, $2, $3, $4)")
                .bind(now.timestamp())
                .bind(&key)
                .bind(stats.mean)
                .bind(stats.stddev)
                .execute(&mut *tx)
                .await
                .map_err(BenchError::Database)?;

            written.push(Statistic {
                timestamp: now,
                key,
                average: stats.mean,
                stddev: stats.stddev,
            });
        }

        tx.commit().await.map_err(BenchError::Database)?;
        info!("写入统计值: {} 条", written.len());
        Ok(written)
    }

    #[instrument(skip(self), fields(now = %now.timestamp()))]
    async fn insert_error_record(&self, now: DateTime<Utc>, count: u64) -> BenchResult<()> {
        if count == 0 {
            return Ok(());
        }

        let count = i64::try_from(count)
            .map_err(|e| BenchError::Internal(format!("错误计数超出范围: {e}")))?;
        sqlx::query("INSERT INTO error (date, count) VALUES ($1, $2)")
            .bind(now.timestamp())
            .bind(count)
            .execute(&self.pool)
            .await
            .map_err(BenchError::Database)?;

        debug!("写入错误计数: {}", count);
        Ok(())
    }

    #[instrument(skip(self, message), fields(command = %message.command))]
    async fn insert_error_message(&self, message: &ErrorMessage) -> BenchResult<()> {
        sqlx::query("INSERT INTO error_msg (date, command, message) VALUES ($1, $2, $3)")
            .bind(message.timestamp.timestamp())
            .bind(&message.command)
            .bind(&message.message)
            .execute(&self.pool)
            .await
            .map_err(BenchError::Database)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn insert_execution_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BenchResult<()> {
        sqlx::query("INSERT INTO execute_time (date, end_date) VALUES ($1, $2)")
            .bind(start.timestamp())
            .bind(end.timestamp())
            .execute(&self.pool)
            .await
            .map_err(BenchError::Database)?;
        Ok(())
    }

    #[instrument(skip(self), fields(target = %path.display()))]
    async fn backup(&self, path: &Path) -> BenchResult<()> {
        tokio::fs::copy(&self.path, path).await?;
        info!("数据库已备份: {} -> {}", self.path.display(), path.display());
        Ok(())
    }
}

#[async_trait]
impl ErrorMessageSink for SqliteMetricsRepository {
    async fn record(&self, message: &ErrorMessage) -> BenchResult<()> {
        self.insert_error_message(message).await
    }
}
