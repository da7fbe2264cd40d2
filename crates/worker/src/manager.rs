use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gfperf_core::models::{Command, FailurePolicy, ManagerState};
use gfperf_core::RunContext;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::FailureLogger;
use crate::executor::ProcessExecutor;
use crate::runner::{Runner, RunnerFailure};

/// 持续压力测试的监督者
///
/// 持有全部Runner，负责全局超时和中断。
pub struct Manager {
    inner: Arc<ManagerInner>,
    failure_rx: Mutex<Option<mpsc::UnboundedReceiver<RunnerFailure>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

struct ManagerInner {
    ctx: Arc<RunContext>,
    runners: Vec<Arc<Runner>>,
    timeout: Option<Duration>,
    state: Mutex<ManagerState>,
    interrupted: AtomicBool,
    stop_helper: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    fn set_state(&self, state: ManagerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn stop_all(&self) {
        for runner in &self.runners {
            runner.stop();
        }
    }

    fn on_timeout(&self) {
        self.ctx.print("end of run (timeout)");
        info!("压力测试超时，停止全部Runner");
        self.set_state(ManagerState::TimedOut);
        self.set_state(ManagerState::Stopping);
        self.stop_all();
    }

    /// 只有第一次中断生效
    fn intr(self: &Arc<Self>) {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            debug!("已经处理过中断，忽略");
            return;
        }

        self.ctx.print("interrupted...");
        info!("收到中断，停止全部Runner");
        self.set_state(ManagerState::Interrupted);
        self.set_state(ManagerState::Stopping);

        let inner = Arc::clone(self);
        let helper = tokio::spawn(async move { inner.stop_all() });
        *self.stop_helper.lock().unwrap_or_else(|p| p.into_inner()) = Some(helper);
    }
}

impl Manager {
    pub fn new(
        ctx: Arc<RunContext>,
        commands: Vec<Command>,
        executor: ProcessExecutor,
        logger: FailureLogger,
        timeout: Option<Duration>,
        policy: FailurePolicy,
    ) -> Self {
        let (failure_tx, failure_rx) = match policy {
            FailurePolicy::StopOnFirstFailure => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(rx))
            }
            FailurePolicy::Continue => (None, None),
        };

        let runners = commands
            .into_iter()
            .enumerate()
            .map(|(id, command)| {
                let runner = Runner::new(id, command, executor.clone(), logger.clone());
                let runner = match &failure_tx {
                    Some(tx) => runner.with_failure_notifier(tx.clone()),
                    None => runner,
                };
                Arc::new(runner)
            })
            .collect();

        Self {
            inner: Arc::new(ManagerInner {
                ctx,
                runners,
                timeout: timeout.filter(|t| !t.is_zero()),
                state: Mutex::new(ManagerState::Idle),
                interrupted: AtomicBool::new(false),
                stop_helper: Mutex::new(None),
            }),
            failure_rx: Mutex::new(failure_rx),
            timer: Mutex::new(None),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ManagerState {
        self.inner.state()
    }

    pub fn runners(&self) -> &[Arc<Runner>] {
        &self.inner.runners
    }

    /// 启动全部Runner以及超时计时器和中断监听
    pub async fn run(&self) {
        self.inner.set_state(ManagerState::Running);
        for runner in &self.inner.runners {
            runner.start().await;
        }
        info!("已启动 {} 个Runner", self.inner.runners.len());

        if let Some(timeout) = self.inner.timeout {
            self.inner
                .ctx
                .print(&format!("timeout: {} seconds", timeout.as_secs()));
            let inner = Arc::clone(&self.inner);
            let timer = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                inner.on_timeout();
            });
            *self.timer.lock().unwrap_or_else(|p| p.into_inner()) = Some(timer);
        }

        let mut watchers = Vec::new();

        let inner = Arc::clone(&self.inner);
        watchers.push(tokio::spawn(async move {
            inner.ctx.cancelled().await;
            inner.intr();
        }));

        let failure_rx = self
            .failure_rx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(mut rx) = failure_rx {
            let inner = Arc::clone(&self.inner);
            watchers.push(tokio::spawn(async move {
                if let Some(failure) = rx.recv().await {
                    warn!(
                        "命令非零退出，按策略停止全部Runner: command={}, exit_code={}",
                        failure.command, failure.exit_code
                    );
                    inner.intr();
                }
            }));
        }

        self.watchers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(watchers);
    }

    /// 中断：停止全部Runner，可重复调用
    pub fn intr(&self) {
        self.inner.intr();
    }

    /// 等待全部Runner结束
    pub async fn wait(&self) {
        for runner in &self.inner.runners {
            runner.wait().await;
        }

        let helper = self
            .inner
            .stop_helper
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(helper) = helper {
            if let Err(e) = helper.await {
                error!("停止任务异常结束: {}", e);
            }
        }

        if let Some(timer) = self.timer.lock().unwrap_or_else(|p| p.into_inner()).take() {
            timer.abort();
        }
        for watcher in self
            .watchers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
        {
            watcher.abort();
        }

        self.inner.set_state(ManagerState::Stopped);
        info!("全部Runner已结束");
    }
}
