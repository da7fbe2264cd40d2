//! 定时基准测试
//!
//! 对每种认证方式依次执行：单项测试、并行组、自动复制组。
//! 结果文本中每行都以 `<认证方式>/` 开头，最后由调用方解析入库。

use std::sync::Arc;

use chrono::Duration;
use gfperf_core::config::{
    render_options, BenchOptions, ParallelMember, SweepConfig, SINGLE_TYPES,
};
use gfperf_core::models::{BatchJob, Command, WorkerResult};
use gfperf_core::{BenchResult, RunContext};
use gfperf_worker::{FailureLogger, ProcessExecutor, ProcessHandle};
use tracing::{debug, error, info, warn};

use crate::aggregator::ResultAggregator;
use crate::batch::{prefix_lines, ParallelBatch};

/// 一次完整执行的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// 所有测试的结果行
    pub results: String,
    /// 运行被中断时为 `false`
    pub completed: bool,
}

pub struct BenchmarkSweep {
    config: SweepConfig,
    executor: ProcessExecutor,
    logger: FailureLogger,
    batch: ParallelBatch,
    aggregator: ResultAggregator,
}

impl BenchmarkSweep {
    pub fn new(config: SweepConfig, executor: ProcessExecutor, logger: FailureLogger) -> Self {
        let batch = ParallelBatch::new(executor.clone(), logger.clone(), config.failure_policy);
        let aggregator = ResultAggregator::new(config.aggregate_marker.clone());
        Self {
            config,
            executor,
            logger,
            batch,
            aggregator,
        }
    }

    fn ctx(&self) -> &Arc<RunContext> {
        self.logger.context()
    }

    fn start_offset(&self) -> Duration {
        Duration::seconds(self.config.start_offset_seconds as i64)
    }

    /// 执行单个命令，运行被中断时终止子进程
    async fn execute_interruptible(
        &self,
        command: &Command,
        handle: &ProcessHandle,
    ) -> BenchResult<WorkerResult> {
        let execution = self.executor.execute(command, handle);
        tokio::pin!(execution);

        tokio::select! {
            result = &mut execution => result,
            _ = self.ctx().cancelled() => {
                debug!("运行被中断，终止子进程: {}", command);
                handle.kill();
                execution.await
            }
        }
    }

    /// 检查服务器状态，stderr有输出时按ERROR记录并返回 `false`
    pub async fn precheck(&self) -> bool {
        let Some(line) = self.config.precheck_command.as_deref() else {
            return true;
        };
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                error!("无效的检查命令 '{}': {}", line, e);
                return false;
            }
        };

        info!("检查服务器状态: {}", command);
        let handle = ProcessHandle::new();
        match self.execute_interruptible(&command, &handle).await {
            Ok(_) if handle.is_killed() => {
                warn!("服务器状态检查被中断");
                true
            }
            Ok(result) => !self.logger.report_error_output(&command, &result.stderr).await,
            Err(e) => {
                self.logger.report_spawn_failure(&command, &e).await;
                false
            }
        }
    }

    /// 单项测试命令，相同的选项组合只执行一次
    pub fn single_commands(&self, key: &str, kind: &str) -> Vec<Command> {
        let Some(option_sets) = self.config.single.get(kind) else {
            return Vec::new();
        };

        unique(option_sets)
            .into_iter()
            .map(|options| {
                self.wrapper_command("")
                    .arg(key)
                    .arg(format!("gfperf-{kind}"))
                    .args(render_options(options))
            })
            .collect()
    }

    /// 逐条执行单项测试
    pub async fn run_single(&self, key: &str, kind: &str) -> String {
        let mut results = String::new();

        for command in self.single_commands(key, kind) {
            if self.ctx().is_cancelled() {
                break;
            }

            self.ctx().print(&command.command_line());
            let handle = ProcessHandle::new();
            match self.execute_interruptible(&command, &handle).await {
                Ok(result) => {
                    let interrupted = handle.is_killed() || self.ctx().is_cancelled();
                    self.logger.report(&command, &result, interrupted).await;
                    results.push_str(&prefix_lines(key, &result.stdout));
                }
                Err(e) => {
                    error!("单项测试启动失败: {}", e);
                    self.logger.report_spawn_failure(&command, &e).await;
                }
            }
        }

        results
    }

    /// wrapper可以带参数，例如 `sh /path/gfperf-wrapper.sh`
    fn wrapper_command(&self, prefix: &str) -> Command {
        let mut parts = self.config.wrapper.split_whitespace();
        let program = parts.next().unwrap_or_default();
        Command::new(format!("{prefix}{program}")).args(parts)
    }

    fn remote_prefix(&self) -> String {
        match self.config.remote_path.as_deref() {
            Some(path) if !path.is_empty() => format!("{}/", path.trim_end_matches('/')),
            _ => String::new(),
        }
    }

    /// 并行组命令，成员可以指定远程主机
    pub fn parallel_commands(
        &self,
        key: &str,
        group: &str,
        members: &[ParallelMember],
    ) -> Vec<Command> {
        let prefix = self.remote_prefix();

        unique(members)
            .into_iter()
            .map(|member| {
                self.wrapper_command(&prefix)
                    .arg(key)
                    .arg(format!("{prefix}gfperf-parallel-{}", member.kind))
                    .args(["--name", group])
                    .args(render_options(&member.options))
                    .on_host(member.rhost.clone())
                    .with_group(group)
            })
            .collect()
    }

    pub async fn run_parallel(
        &self,
        key: &str,
        group: &str,
        members: &[ParallelMember],
    ) -> String {
        let commands = self.parallel_commands(key, group, members);
        if commands.is_empty() {
            return String::new();
        }

        debug!(
            "执行并行组: key={}, group={}, members={}",
            key,
            group,
            commands.len()
        );
        let job = BatchJob::new(commands, self.start_offset());
        self.batch.run(&job).await.prefixed(key)
    }

    pub fn autoreplica_commands(
        &self,
        key: &str,
        group: &str,
        replicas: &[BenchOptions],
    ) -> Vec<Command> {
        unique(replicas)
            .into_iter()
            .map(|options| {
                self.wrapper_command("")
                    .arg(key)
                    .arg("gfperf-parallel-autoreplica")
                    .args(["--name", group])
                    .args(render_options(options))
                    .with_group(group)
            })
            .collect()
    }

    /// 执行自动复制组并汇总为一行
    pub async fn run_autoreplica(
        &self,
        key: &str,
        group: &str,
        replicas: &[BenchOptions],
    ) -> String {
        let commands = self.autoreplica_commands(key, group, replicas);
        if commands.is_empty() {
            return String::new();
        }

        debug!(
            "执行自动复制组: key={}, group={}, replicas={}",
            key,
            group,
            commands.len()
        );
        let job = BatchJob::new(commands, self.start_offset());
        let output = self.batch.run(&job).await;

        match self.aggregator.aggregate(&output.prefixed_slots(key)) {
            Some(line) => format!("{line}\n"),
            None => {
                warn!("自动复制组没有任何结果: key={}, group={}", key, group);
                String::new()
            }
        }
    }

    /// 对所有认证方式执行全部测试
    ///
    /// 中断后不再启动新的测试，已完成部分的结果照常返回。
    pub async fn run(&self) -> SweepReport {
        let mut results = String::new();

        for key in &self.config.authentication {
            info!("开始基准测试: authentication={}", key);

            for kind in SINGLE_TYPES {
                if self.ctx().is_cancelled() {
                    break;
                }
                results.push_str(&self.run_single(key, kind).await);
            }

            for (group, members) in &self.config.parallel {
                if self.ctx().is_cancelled() {
                    break;
                }
                results.push_str(&self.run_parallel(key, group, members).await);
            }

            for (group, replicas) in &self.config.parallel_autoreplica {
                if self.ctx().is_cancelled() {
                    break;
                }
                results.push_str(&self.run_autoreplica(key, group, replicas).await);
            }

            if self.ctx().is_cancelled() {
                warn!("基准测试被中断: authentication={}", key);
                break;
            }
        }

        SweepReport {
            results,
            completed: !self.ctx().is_cancelled(),
        }
    }
}

/// 去掉重复项，保留第一次出现的顺序
fn unique<T: PartialEq>(items: &[T]) -> Vec<&T> {
    let mut seen: Vec<&T> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use gfperf_core::config::OptionValue;
    use gfperf_core::{CapturedOutput, Console, DiscardSink};
    use gfperf_worker::FailureClassifier;

    fn sweep(config: SweepConfig) -> (BenchmarkSweep, Arc<RunContext>, CapturedOutput) {
        let (console, captured) = Console::captured();
        let console = Arc::new(console);
        let ctx = Arc::new(RunContext::new(Arc::clone(&console)));
        let logger = FailureLogger::new(
            Arc::clone(&ctx),
            FailureClassifier::new(Vec::new()),
            Arc::new(DiscardSink),
            None,
        );
        (
            BenchmarkSweep::new(config, ProcessExecutor::new(console), logger),
            ctx,
            captured,
        )
    }

    fn options(pairs: &[(&str, OptionValue)]) -> BenchOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_single_commands_deduplicated() {
        let mut config = SweepConfig::default();
        let opts = options(&[
            ("testdir", OptionValue::Text("gfarm:///tmp".to_string())),
            ("number", OptionValue::Integer(250)),
        ]);
        config
            .single
            .insert("metadata".to_string(), vec![opts.clone(), opts]);
        let (sweep, _, _) = sweep(config);

        let commands = sweep.single_commands("gsi", "metadata");
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].command_line(),
            "gfperf-wrapper.sh gsi gfperf-metadata --number 250 --testdir gfarm:///tmp"
        );
        assert!(sweep.single_commands("gsi", "tree").is_empty());
    }

    #[test]
    fn test_parallel_commands_with_remote_host() {
        let mut config = SweepConfig::default();
        config.remote_path = Some("/opt/gfarm/bin/".to_string());
        let (sweep, _, _) = sweep(config);

        let members = vec![
            ParallelMember {
                kind: "read".to_string(),
                rhost: Some("node01".to_string()),
                options: options(&[("filesize", OptionValue::Text("1G".to_string()))]),
            },
            ParallelMember {
                kind: "write".to_string(),
                rhost: None,
                options: BenchOptions::new(),
            },
        ];

        let commands = sweep.parallel_commands("sharedsecret", "group1", &members);
        assert_eq!(
            commands[0].command_line(),
            "ssh node01 /opt/gfarm/bin/gfperf-wrapper.sh sharedsecret \
             /opt/gfarm/bin/gfperf-parallel-read --name group1 --filesize 1G"
        );
        assert_eq!(commands[0].group(), Some("group1"));
        assert_eq!(
            commands[1].command_line(),
            "/opt/gfarm/bin/gfperf-wrapper.sh sharedsecret \
             /opt/gfarm/bin/gfperf-parallel-write --name group1"
        );
    }

    #[test]
    fn test_autoreplica_commands() {
        let (sweep, _, _) = sweep(SweepConfig::default());
        let replicas = vec![options(&[("number", OptionValue::Integer(3))])];
        let commands = sweep.autoreplica_commands("gsi", "auto1", &replicas);
        assert_eq!(
            commands[0].command_line(),
            "gfperf-wrapper.sh gsi gfperf-parallel-autoreplica --name auto1 --number 3"
        );
    }

    #[tokio::test]
    async fn test_precheck_reports_stderr() {
        let mut config = SweepConfig::default();
        config.precheck_command = Some("/bin/sh -c echo".to_string());
        let (ok_sweep, ctx, _) = sweep(config);
        assert!(ok_sweep.precheck().await);
        assert_eq!(ctx.error_count(), 0);

        let mut config = SweepConfig::default();
        config.precheck_command = Some("/nonexistent/gfsched".to_string());
        let (bad_sweep, ctx, captured) = sweep(config);
        assert!(!bad_sweep.precheck().await);
        assert_eq!(ctx.error_count(), 1);
        assert!(captured.contents().contains("[COMMAND] /nonexistent/gfsched"));

        let mut config = SweepConfig::default();
        config.precheck_command = None;
        let (skip_sweep, _, _) = sweep(config);
        assert!(skip_sweep.precheck().await);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_launches_nothing() {
        let mut config = SweepConfig::default();
        config.wrapper = "/bin/echo".to_string();
        config.single.insert(
            "metadata".to_string(),
            vec![options(&[("number", OptionValue::Integer(1))])],
        );
        let (sweep, ctx, captured) = sweep(config);
        ctx.cancel();

        let report = sweep.run().await;
        assert!(!report.completed);
        assert!(report.results.is_empty());
        assert!(captured.contents().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_running_single() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gfperf-wrapper.sh");
        std::fs::write(&script, "echo started\nexec sleep 30\n").unwrap();

        let mut config = SweepConfig::default();
        config.wrapper = format!("/bin/sh {}", script.display());
        config
            .single
            .insert("metadata".to_string(), vec![BenchOptions::new()]);
        config
            .single
            .insert("tree".to_string(), vec![BenchOptions::new()]);
        let (sweep, ctx, captured) = sweep(config);

        let canceller = Arc::clone(&ctx);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let report = tokio::time::timeout(std::time::Duration::from_secs(10), sweep.run())
            .await
            .unwrap();

        assert!(!report.completed);
        assert_eq!(report.results, "sharedsecret/started\n");
        // 被中断的运行不计入错误
        assert_eq!(ctx.error_count(), 0);
        // 中断后不再启动tree
        assert!(!captured.contents().contains("gfperf-tree"));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_precheck() {
        let mut config = SweepConfig::default();
        config.precheck_command = Some("sleep 30".to_string());
        let (sweep, ctx, _) = sweep(config);

        let canceller = Arc::clone(&ctx);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let passed = tokio::time::timeout(std::time::Duration::from_secs(10), sweep.precheck())
            .await
            .unwrap();
        assert!(passed);
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_unique_keeps_first_order() {
        assert_eq!(unique(&[3, 1, 3, 2, 1]), vec![&3, &1, &2]);
    }
}
