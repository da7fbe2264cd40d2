use std::sync::Arc;

use anyhow::{Context, Result};
use gfperf_core::RunContext;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 把进程信号转交给运行上下文
///
/// SIGINT、SIGTERM和SIGPIPE都按中断处理，由监督器或批次自行终止子进程。
pub struct SignalDispatcher {
    ctx: Arc<RunContext>,
}

impl SignalDispatcher {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    /// 安装信号处理器并在后台等待信号
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let mut interrupt = signal(SignalKind::interrupt()).context("安装SIGINT信号处理器失败")?;
        let mut terminate = signal(SignalKind::terminate()).context("安装SIGTERM信号处理器失败")?;
        let mut pipe = signal(SignalKind::pipe()).context("安装SIGPIPE信号处理器失败")?;

        Ok(tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                    _ = pipe.recv() => "SIGPIPE",
                };

                if self.ctx.cancel() {
                    info!("收到{}信号，中断运行", name);
                } else {
                    warn!("收到{}信号，运行已在中断中", name);
                }
            }
        }))
    }
}
