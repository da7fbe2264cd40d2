use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use gfperf_core::models::parse_measurements;
use gfperf_core::{
    AppConfig, Console, DiscardSink, ErrorMessageSink, MetricsRepository, RunContext,
};
use gfperf_dispatcher::BenchmarkSweep;
use gfperf_infrastructure::{DatabaseManager, SqliteMetricsRepository};
use gfperf_worker::workload::hostname;
use gfperf_worker::{FailureLogger, Manager, ProcessExecutor, StressWorkload};
use tracing::{error, info, warn};

/// 一次运行的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// 收到信号或输出管道断开
    Interrupted,
    /// 服务器状态检查失败，没有执行任何测试
    PrecheckFailed,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    ctx: Arc<RunContext>,
    executor: ProcessExecutor,
}

impl Application {
    pub fn new(config: AppConfig, console: Arc<Console>) -> Self {
        let ctx = Arc::new(RunContext::new(Arc::clone(&console)));
        Self {
            config,
            ctx,
            executor: ProcessExecutor::new(console),
        }
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn failure_logger(&self, sink: Arc<dyn ErrorMessageSink>) -> FailureLogger {
        FailureLogger::from_config(Arc::clone(&self.ctx), &self.config.classifier, sink)
    }

    /// 按配置准备gfsd测试目录，没有配置时返回 `None`
    async fn prepare_workload(&self) -> Result<Option<StressWorkload>> {
        let Some(config) = &self.config.stress.workload else {
            return Ok(None);
        };

        let hosts = StressWorkload::discover_hosts(&self.executor, &config.host_command)
            .await
            .context("获取gfsd列表失败")?;
        let workload = StressWorkload::new(
            config,
            hosts,
            self.config.stress.multiplex,
            &hostname()?,
            std::process::id(),
        );
        info!(
            "准备测试目录: {}, gfsd={}",
            workload.top_dir(),
            workload.hosts().len()
        );
        workload
            .prepare(&self.executor)
            .await
            .context("准备测试目录失败")?;
        Ok(Some(workload))
    }

    /// 持续压力测试，直到超时或被中断
    pub async fn run_stress(&self) -> Result<RunOutcome> {
        let mut commands = self.config.stress.expanded_commands()?;
        if commands.is_empty() && self.config.stress.workload.is_none() {
            return Err(anyhow::anyhow!("没有配置压力测试命令"));
        }

        let workload = self.prepare_workload().await?;
        if let Some(workload) = &workload {
            commands.extend(workload.commands());
        }

        self.ctx.print(&format!("start at {}", banner_time()));
        info!("启动压力测试: {} 个命令", commands.len());

        let manager = Manager::new(
            Arc::clone(&self.ctx),
            commands,
            self.executor.clone(),
            self.failure_logger(Arc::new(DiscardSink)),
            self.config.stress.timeout(),
            self.config.stress.failure_policy,
        );
        manager.run().await;
        manager.wait().await;

        self.ctx.print(&format!("stop at {}", banner_time()));
        info!("压力测试结束: errors={}", self.ctx.error_count());

        if let Some(workload) = &workload {
            self.ctx.print("clean up...");
            workload.cleanup(&self.executor).await;
            self.ctx.print("done.");
        }

        Ok(self.outcome())
    }

    /// 执行一次完整的基准测试并把结果写入数据库
    pub async fn run_sweep(&self) -> Result<RunOutcome> {
        let database = DatabaseManager::new(&self.config.database)
            .await
            .context("打开结果数据库失败")?;
        database.migrate().await?;
        let repo = Arc::new(database.metrics_repository());

        let sweep = BenchmarkSweep::new(
            self.config.sweep.clone(),
            self.executor.clone(),
            self.failure_logger(repo.clone()),
        );

        if !sweep.precheck().await {
            warn!("服务器状态检查失败，跳过本次测试");
            self.persist_run_summary(&repo).await?;
            self.backup(&repo).await;
            database.close().await;
            return Ok(RunOutcome::PrecheckFailed);
        }

        let report = sweep.run().await;
        if !report.completed {
            warn!("基准测试被中断，保存已完成部分的结果");
        }

        let now = self.ctx.started_at();
        let measurements = parse_measurements(&report.results, now);
        repo.insert_measurements(&measurements)
            .await
            .context("写入测量值失败")?;
        info!("写入测量值: {} 条", measurements.len());

        repo.insert_error_record(now, self.ctx.error_count())
            .await
            .context("写入错误计数失败")?;
        let window = self.config.database.statistics_window()?;
        repo.compute_statistics(now, window)
            .await
            .context("计算统计值失败")?;
        repo.insert_execution_window(now, Utc::now())
            .await
            .context("写入执行时间失败")?;

        self.backup(&repo).await;
        database.close().await;

        Ok(self.outcome())
    }

    async fn persist_run_summary(&self, repo: &SqliteMetricsRepository) -> Result<()> {
        let now = self.ctx.started_at();
        repo.insert_error_record(now, self.ctx.error_count())
            .await
            .context("写入错误计数失败")?;
        repo.insert_execution_window(now, Utc::now())
            .await
            .context("写入执行时间失败")?;
        Ok(())
    }

    /// 备份失败只记录，不影响本次运行的结果
    async fn backup(&self, repo: &SqliteMetricsRepository) {
        let Some(target) = self.config.database.backup_path.as_deref() else {
            return;
        };
        if let Err(e) = repo.backup(Path::new(target)).await {
            error!("备份数据库失败: {}", e);
            self.ctx.print(&format!("backup failed: {e}"));
        }
    }

    fn outcome(&self) -> RunOutcome {
        if self.ctx.is_cancelled() {
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        }
    }
}

fn banner_time() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string()
}
