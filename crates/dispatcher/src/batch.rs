use std::sync::Arc;

use futures::future::join_all;
use gfperf_core::models::{BatchJob, FailurePolicy};
use gfperf_core::RunContext;
use gfperf_worker::{FailureLogger, ProcessExecutor, ProcessHandle};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 一个批次中各成员的stdout，按构造顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    /// 启动失败或stdout为空时为 `None`
    pub slots: Vec<Option<String>>,
}

impl BatchOutput {
    /// 每行加上 `<key>/` 前缀后的各成员输出
    pub fn prefixed_slots(&self, key: &str) -> Vec<Option<String>> {
        self.slots
            .iter()
            .map(|slot| slot.as_deref().map(|text| prefix_lines(key, text)))
            .collect()
    }

    /// 按原顺序拼接所有非空输出
    pub fn prefixed(&self, key: &str) -> String {
        self.prefixed_slots(key).into_iter().flatten().collect()
    }
}

/// 每行加上 `<key>/` 前缀，以换行结尾
pub fn prefix_lines(key: &str, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + key.len() * 4);
    for line in text.lines() {
        out.push_str(key);
        out.push('/');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// 同步并行批次
///
/// 每条命令一个任务，所有命令收到同一个 `--wait <start>`。
#[derive(Clone)]
pub struct ParallelBatch {
    executor: ProcessExecutor,
    logger: FailureLogger,
    policy: FailurePolicy,
}

impl ParallelBatch {
    pub fn new(executor: ProcessExecutor, logger: FailureLogger, policy: FailurePolicy) -> Self {
        Self {
            executor,
            logger,
            policy,
        }
    }

    fn context(&self) -> &Arc<RunContext> {
        self.logger.context()
    }

    /// 启动批次中的全部命令
    pub fn launch(&self, job: &BatchJob) -> RunningBatch {
        let commands = job.scheduled_commands();
        let handles: Arc<Vec<ProcessHandle>> =
            Arc::new(commands.iter().map(|_| ProcessHandle::new()).collect());

        info!(
            "启动并行批次: members={}, start={}",
            commands.len(),
            job.wait_arg()
        );

        let tasks = commands
            .into_iter()
            .enumerate()
            .map(|(slot, command)| {
                let executor = self.executor.clone();
                let logger = self.logger.clone();
                let handles = Arc::clone(&handles);
                let policy = self.policy;

                tokio::spawn(async move {
                    let ctx = Arc::clone(logger.context());
                    let handle = &handles[slot];
                    ctx.print(&command.command_line());

                    let result = match executor.execute(&command, handle).await {
                        Ok(result) => result,
                        Err(e) => {
                            error!("并行批次成员启动失败: slot={}, error={}", slot, e);
                            logger.report_spawn_failure(&command, &e).await;
                            return None;
                        }
                    };

                    let interrupted = handle.is_killed() || ctx.is_cancelled();
                    logger.report(&command, &result, interrupted).await;

                    if !interrupted
                        && !result.success()
                        && policy == FailurePolicy::StopOnFirstFailure
                    {
                        warn!(
                            "并行批次成员失败，终止其余成员: slot={}, exit_code={:?}",
                            slot, result.exit_code
                        );
                        for (other, h) in handles.iter().enumerate() {
                            if other != slot {
                                h.kill();
                            }
                        }
                    }

                    debug!(
                        "并行批次成员结束: slot={}, exit_code={:?}",
                        slot, result.exit_code
                    );
                    (!result.stdout.is_empty()).then_some(result.stdout)
                })
            })
            .collect();

        let ctx = Arc::clone(self.context());
        let cancel_handles = Arc::clone(&handles);
        let cancel_watcher = tokio::spawn(async move {
            ctx.cancelled().await;
            for handle in cancel_handles.iter() {
                handle.kill();
            }
        });

        RunningBatch {
            tasks,
            cancel_watcher,
        }
    }

    /// 启动并等待批次结束
    pub async fn run(&self, job: &BatchJob) -> BatchOutput {
        self.launch(job).join().await
    }
}

/// 正在运行的批次
pub struct RunningBatch {
    tasks: Vec<JoinHandle<Option<String>>>,
    cancel_watcher: JoinHandle<()>,
}

impl RunningBatch {
    /// 等待所有成员结束，结果按原顺序放入各自的位置
    pub async fn join(self) -> BatchOutput {
        let slots = join_all(self.tasks)
            .await
            .into_iter()
            .enumerate()
            .map(|(slot, joined)| match joined {
                Ok(output) => output,
                Err(e) => {
                    error!("并行批次成员任务异常结束: slot={}, error={}", slot, e);
                    None
                }
            })
            .collect();

        self.cancel_watcher.abort();
        BatchOutput { slots }
    }
}
