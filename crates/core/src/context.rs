//! 运行上下文
//!
//! 每次运行拥有一个 [`RunContext`]，代替进程级全局变量：运行时间戳、
//! 取消信号、运行级错误计数以及共享控制台都从这里取得。
//! 操作系统信号由二进制中的信号分发器转发到 [`RunContext::cancel`]，
//! 各组件只观察上下文，不自行安装信号处理器。

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::console::Console;

pub struct RunContext {
    started_at: DateTime<Utc>,
    console: Arc<Console>,
    cancel_tx: broadcast::Sender<()>,
    cancelled: AtomicBool,
    error_count: AtomicU64,
}

impl RunContext {
    pub fn new(console: Arc<Console>) -> Self {
        let (cancel_tx, _) = broadcast::channel(16);
        Self {
            started_at: Utc::now(),
            console,
            cancel_tx,
            cancelled: AtomicBool::new(false),
            error_count: AtomicU64::new(0),
        }
    }

    /// 运行开始时间，同时作为本次运行所有记录的时间戳
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    /// 向共享控制台整块输出
    ///
    /// 消费端已关闭（broken pipe）时按中断处理。
    pub fn print(&self, text: &str) {
        if let Err(e) = self.console.write_block(text) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                warn!("控制台输出管道已关闭，按中断处理");
                self.cancel();
            } else {
                warn!("写控制台失败: {}", e);
            }
        }
    }

    /// 触发取消，只有第一次调用返回 `true`
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("运行上下文已经取消过");
            return false;
        }

        info!("运行上下文收到取消请求");
        let subscriber_count = self.cancel_tx.receiver_count();
        debug!("发送取消信号给 {} 个订阅者", subscriber_count);
        // 没有接收者时发送失败，忽略
        let _ = self.cancel_tx.send(());
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 等待取消信号；已经取消时立即返回
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        if self.is_cancelled() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// 记录一次失败的命令调用，返回新的计数
    pub fn record_error(&self) -> u64 {
        self.error_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_context() -> RunContext {
        let (console, _) = Console::captured();
        RunContext::new(Arc::new(console))
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let ctx = test_context();
        assert!(!ctx.is_cancelled());
        assert!(ctx.cancel());
        assert!(!ctx.cancel());
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let ctx = Arc::new(test_context());

        let waiter = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { ctx.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();

        let result = timeout(Duration::from_millis(500), waiter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_after_cancel_returns_immediately() {
        let ctx = test_context();
        ctx.cancel();
        let result = timeout(Duration::from_millis(100), ctx.cancelled()).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_error_counter() {
        let ctx = test_context();
        assert_eq!(ctx.error_count(), 0);
        assert_eq!(ctx.record_error(), 1);
        assert_eq!(ctx.record_error(), 2);
        assert_eq!(ctx.error_count(), 2);
    }

    #[test]
    fn test_print_goes_to_console() {
        let (console, captured) = Console::captured();
        let ctx = RunContext::new(Arc::new(console));
        ctx.print("start at now");
        assert_eq!(captured.contents(), "start at now\n");
    }
}
