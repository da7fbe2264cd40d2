pub mod sqlite_metrics_repository;

pub use sqlite_metrics_repository::SqliteMetricsRepository;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use gfperf_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date INTEGER NOT NULL,
        key TEXT NOT NULL,
        val REAL NOT NULL,
        unit TEXT NOT NULL,
        exec_time REAL DEFAULT 0,
        exec_unit TEXT DEFAULT 'sec'
    )",
    "CREATE TABLE IF NOT EXISTS statistics (
        date INTEGER NOT NULL,
        key TEXT NOT NULL,
        avr REAL NOT NULL,
        stddev REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS error (date INTEGER NOT NULL, count INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS error_msg (date INTEGER NOT NULL, command TEXT, message TEXT)",
    "CREATE TABLE IF NOT EXISTS execute_time (date INTEGER NOT NULL, end_date INTEGER NOT NULL)",
    "CREATE INDEX IF NOT EXISTS data_date_index ON data(date)",
    "CREATE INDEX IF NOT EXISTS data_key_index ON data(key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS data_date_key_index ON data(date, key)",
    "CREATE INDEX IF NOT EXISTS statistics_date_index ON statistics(date)",
    "CREATE INDEX IF NOT EXISTS error_date_index ON error(date)",
    "CREATE INDEX IF NOT EXISTS error_msg_date_index ON error_msg(date)",
    "CREATE INDEX IF NOT EXISTS execute_time_date_index ON execute_time(date)",
];

pub struct DatabaseManager {
    pool: SqlitePool,
    path: PathBuf,
}

impl DatabaseManager {
    /// 打开数据库，文件不存在时创建
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("无效的数据库URL: {}", config.url))?
            .create_if_missing(true)
            // 备份直接复制数据库文件，不使用WAL
            .journal_mode(SqliteJournalMode::Delete);
        let path = options.get_filename().to_path_buf();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.url))?;

        info!("数据库已打开: {}", path.display());
        Ok(Self { pool, path })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 数据库文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 建表和索引，已存在的跳过
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .context("初始化数据库表结构失败")?;
        }
        debug!("数据库表结构已就绪");
        Ok(())
    }

    pub fn metrics_repository(&self) -> SqliteMetricsRepository {
        SqliteMetricsRepository::new(self.pool.clone(), self.path.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
