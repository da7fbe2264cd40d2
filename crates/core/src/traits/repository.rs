//! 结果存储层接口定义
//!
//! - `MetricsRepository` - 测量值、统计值、错误记录和执行时间的持久化
//! - `ErrorMessageSink` - 单条错误信息的写入，由错误分类器在运行过程中调用
//!
//! 所有时间戳以运行开始时间为准，同一次运行的所有记录使用同一个时间戳。
//!
//! ```rust,ignore
//! use gfperf_core::traits::MetricsRepository;
//!
//! async fn persist(repo: &dyn MetricsRepository, ms: &[Measurement]) -> BenchResult<()> {
//!     let now = Utc::now();
//!     repo.insert_measurements(ms).await?;
//!     let written = repo.compute_statistics(now, Duration::days(30)).await?;
//!     println!("写入统计值: {}", written.len());
//!     Ok(())
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::models::{ErrorMessage, Measurement, Statistic};
use crate::BenchResult;

/// 基准测试结果仓储接口
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    /// 在一个事务中写入一批测量值
    async fn insert_measurements(&self, measurements: &[Measurement]) -> BenchResult<()>;

    /// 为每个出现过的key计算窗口 `(now - window, ..]` 内的均值和总体标准差
    ///
    /// 窗口内没有数据的key跳过。返回写入的统计值。
    async fn compute_statistics(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> BenchResult<Vec<Statistic>>;

    /// 写入运行的错误计数，计数为0时不写
    async fn insert_error_record(&self, now: DateTime<Utc>, count: u64) -> BenchResult<()>;

    async fn insert_error_message(&self, message: &ErrorMessage) -> BenchResult<()>;

    /// 写入一次运行的起止时间
    async fn insert_execution_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BenchResult<()>;

    /// 把数据库复制到备份路径
    async fn backup(&self, path: &Path) -> BenchResult<()>;
}

/// 错误信息的写入端
#[async_trait]
pub trait ErrorMessageSink: Send + Sync {
    async fn record(&self, message: &ErrorMessage) -> BenchResult<()>;
}

/// 什么都不记录的写入端，用于不需要持久化的运行
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl ErrorMessageSink for DiscardSink {
    async fn record(&self, _message: &ErrorMessage) -> BenchResult<()> {
        Ok(())
    }
}
