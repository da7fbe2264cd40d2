use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gfperf_core::models::{Command, WorkerState};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::classifier::FailureLogger;
use crate::executor::{ProcessExecutor, ProcessHandle};

/// 启动失败后重试前的停顿
pub const SPAWN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// 非零退出的通知
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerFailure {
    pub runner_id: usize,
    pub command: String,
    pub exit_code: i32,
}

/// 反复执行同一条命令的Worker
pub struct Runner {
    id: usize,
    command: Command,
    executor: ProcessExecutor,
    logger: FailureLogger,
    running: AtomicBool,
    handle: ProcessHandle,
    state: Mutex<WorkerState>,
    stop_notify: Notify,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    failure_tx: Option<mpsc::UnboundedSender<RunnerFailure>>,
}

impl Runner {
    pub fn new(
        id: usize,
        command: Command,
        executor: ProcessExecutor,
        logger: FailureLogger,
    ) -> Self {
        Self {
            id,
            command,
            executor,
            logger,
            running: AtomicBool::new(false),
            handle: ProcessHandle::new(),
            state: Mutex::new(WorkerState::Idle),
            stop_notify: Notify::new(),
            task: tokio::sync::Mutex::new(None),
            failure_tx: None,
        }
    }

    /// 非零退出时通过该通道通知
    pub fn with_failure_notifier(mut self, tx: mpsc::UnboundedSender<RunnerFailure>) -> Self {
        self.failure_tx = Some(tx);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    /// 启动执行循环
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            debug!("Runner {} 已经启动", self.id);
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let runner = Arc::clone(self);
        *task = Some(tokio::spawn(async move { runner.run_loop().await }));
        info!("Runner {} 启动: {}", self.id, self.command);
    }

    async fn run_loop(self: Arc<Self>) {
        let ctx = Arc::clone(self.logger.context());

        while self.is_running() {
            self.set_state(WorkerState::Starting);

            let running = match self.executor.spawn(&self.command, &self.handle) {
                Ok(running) => running,
                Err(e) => {
                    error!("Runner {} 启动命令失败: {}", self.id, e);
                    self.set_state(WorkerState::Completed { exit_code: None });
                    self.logger.report_spawn_failure(&self.command, &e).await;
                    self.pause_after_spawn_failure().await;
                    self.back_to_idle();
                    continue;
                }
            };

            self.set_state(WorkerState::Running);
            let result = match running.wait().await {
                Ok(result) => result,
                Err(e) => {
                    error!("Runner {} 等待命令结束失败: {}", self.id, e);
                    self.set_state(WorkerState::Completed { exit_code: None });
                    self.back_to_idle();
                    continue;
                }
            };

            let interrupted = !self.is_running();
            self.set_state(WorkerState::Completed {
                exit_code: result.exit_code,
            });
            self.logger
                .report(&self.command, &result, interrupted)
                .await;

            if let Some(code) = result.exit_code.filter(|c| *c != 0) {
                ctx.print(&format!("[COMMAND] {}, exitcode={}", self.command, code));
                if !interrupted {
                    if let Some(tx) = &self.failure_tx {
                        let _ = tx.send(RunnerFailure {
                            runner_id: self.id,
                            command: self.command.command_line(),
                            exit_code: code,
                        });
                    }
                }
            }

            self.back_to_idle();
        }

        self.set_state(WorkerState::Stopped);
        debug!("Runner {} 执行循环结束", self.id);
    }

    fn back_to_idle(&self) {
        if self.is_running() {
            self.set_state(WorkerState::Idle);
        }
    }

    async fn pause_after_spawn_failure(&self) {
        let notified = self.stop_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_running() {
            tokio::select! {
                _ = tokio::time::sleep(SPAWN_RETRY_DELAY) => {}
                _ = notified => {}
            }
        }
    }

    /// 停止循环并终止当前子进程，可重复调用
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("停止Runner {}", self.id);
        }
        self.stop_notify.notify_waiters();
        self.handle.kill();
    }

    /// 等待执行循环结束
    pub async fn wait(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Runner {} 执行任务异常结束: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FailureClassifier;
    use gfperf_core::{CapturedOutput, Console, DiscardSink, RunContext};
    use tokio::time::timeout;

    fn runner(script: &str) -> (Arc<Runner>, Arc<RunContext>, CapturedOutput) {
        let (console, captured) = Console::captured();
        let console = Arc::new(console);
        let ctx = Arc::new(RunContext::new(Arc::clone(&console)));
        let logger = FailureLogger::new(
            Arc::clone(&ctx),
            FailureClassifier::new(vec!["[1000058] connecting to gfmd".to_string()]),
            Arc::new(DiscardSink),
            None,
        );
        let command = Command::new("/bin/sh").arg("-c").arg(script);
        let runner = Runner::new(0, command, ProcessExecutor::new(console), logger);
        (Arc::new(runner), ctx, captured)
    }

    #[tokio::test]
    async fn test_stop_then_wait_terminates() {
        let (runner, _, captured) = runner("exec sleep 30");
        runner.start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runner.state(), WorkerState::Running);

        runner.stop();
        runner.stop();
        timeout(Duration::from_secs(10), runner.wait()).await.unwrap();

        assert_eq!(runner.state(), WorkerState::Stopped);
        assert!(runner.state().is_terminal());
        assert!(!captured.contents().contains("exitcode"));
    }

    #[tokio::test]
    async fn test_restarts_and_reports_exit_code() {
        let (runner, ctx, captured) = runner("echo failed 1>&2; sleep 0.05; exit 2");
        runner.start().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        runner.stop();
        timeout(Duration::from_secs(10), runner.wait()).await.unwrap();

        let output = captured.contents();
        let exit_lines = output
            .lines()
            .filter(|l| l.ends_with(", exitcode=2"))
            .count();
        assert!(exit_lines >= 2, "expected restarts, got:\n{output}");
        assert!(output.contains("[ERROR] failed"));
        assert!(ctx.error_count() >= 2);
    }

    #[tokio::test]
    async fn test_interrupted_output_is_not_counted() {
        let (runner, ctx, captured) =
            runner("trap 'echo stopping 1>&2; exit 0' TERM; while true; do sleep 0.05; done");
        runner.start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        runner.stop();
        timeout(Duration::from_secs(10), runner.wait()).await.unwrap();

        assert!(captured.contents().contains("[INTERRUPTED] stopping"));
        assert_eq!(ctx.error_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_keeps_looping_until_stopped() {
        let (console, captured) = Console::captured();
        let console = Arc::new(console);
        let ctx = Arc::new(RunContext::new(Arc::clone(&console)));
        let logger = FailureLogger::new(
            Arc::clone(&ctx),
            FailureClassifier::new(Vec::new()),
            Arc::new(DiscardSink),
            None,
        );
        let runner = Arc::new(Runner::new(
            1,
            Command::new("/nonexistent/gfperf-missing"),
            ProcessExecutor::new(console),
            logger,
        ));

        runner.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.stop();
        timeout(Duration::from_secs(5), runner.wait()).await.unwrap();

        assert_eq!(ctx.error_count(), 1);
        assert!(captured
            .contents()
            .starts_with("[COMMAND] /nonexistent/gfperf-missing\n[ERROR] "));
    }

    #[tokio::test]
    async fn test_failure_notifier() {
        let (runner, _, _) = runner("exit 5");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = Arc::new(
            Arc::try_unwrap(runner)
                .ok()
                .unwrap()
                .with_failure_notifier(tx),
        );

        runner.start().await;
        let failure = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        runner.stop();
        runner.wait().await;

        assert_eq!(failure.exit_code, 5);
        assert_eq!(failure.runner_id, 0);
    }
}
