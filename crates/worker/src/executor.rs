use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use gfperf_core::models::{Command, WorkerResult};
use gfperf_core::{BenchError, BenchResult, Console};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct HandleState {
    pid: Option<u32>,
    killed: bool,
}

/// 当前子进程的句柄
///
/// `kill()` 之后由同一句柄启动的子进程也会立即收到SIGTERM。
#[derive(Debug, Clone, Default)]
pub struct ProcessHandle {
    state: Arc<Mutex<HandleState>>,
}

impl ProcessHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    pub fn is_killed(&self) -> bool {
        self.lock().killed
    }

    /// 向当前子进程发送SIGTERM
    ///
    /// 没有子进程、子进程已回收或进程不存在时什么都不做。
    pub fn kill(&self) {
        let mut state = self.lock();
        state.killed = true;
        if let Some(pid) = state.pid {
            send_sigterm(pid);
        }
    }

    fn attach(&self, pid: Option<u32>) {
        let mut state = self.lock();
        state.pid = pid;
        if state.killed {
            if let Some(pid) = pid {
                debug!("句柄已被停止，立即终止新进程: pid={}", pid);
                send_sigterm(pid);
            }
        }
    }

    fn detach(&self) {
        self.lock().pid = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandleState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn send_sigterm(pid: u32) {
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => debug!("已发送SIGTERM: pid={}", pid),
        Err(Errno::ESRCH) => debug!("进程已退出: pid={}", pid),
        Err(e) => warn!("发送SIGTERM失败: pid={}, error={}", pid, e),
    }
}

/// 已启动、正在运行的子进程
pub struct RunningProcess {
    command_line: String,
    child: Child,
    handle: ProcessHandle,
    stdout_task: JoinHandle<std::io::Result<Vec<u8>>>,
    stderr_task: JoinHandle<std::io::Result<Vec<u8>>>,
    started: Instant,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// 等待进程退出，然后等两个读取任务读完
    pub async fn wait(mut self) -> BenchResult<WorkerResult> {
        let status = self.child.wait().await;
        self.handle.detach();
        let status = status?;

        let stdout = drain_result(self.stdout_task.await?, "stdout", &self.command_line);
        let stderr = drain_result(self.stderr_task.await?, "stderr", &self.command_line);

        let result = WorkerResult {
            stdout,
            stderr,
            exit_code: status.code(),
            elapsed: self.started.elapsed(),
        };

        debug!(
            "命令执行完成: command={}, exit_code={:?}, duration={}ms",
            self.command_line,
            result.exit_code,
            result.elapsed.as_millis()
        );

        Ok(result)
    }
}

fn drain_result(result: std::io::Result<Vec<u8>>, stream: &str, command_line: &str) -> String {
    match result {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("读取{}失败: command={}, error={}", stream, command_line, e);
            String::new()
        }
    }
}

fn spawn_drain<R>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Ok(buffer)
    })
}

/// 外部命令执行器
#[derive(Clone)]
pub struct ProcessExecutor {
    console: Arc<Console>,
}

impl ProcessExecutor {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    /// 启动命令
    ///
    /// stdin接到 `/dev/null`，stdout和stderr各由一个任务读到EOF。
    pub fn spawn(&self, command: &Command, handle: &ProcessHandle) -> BenchResult<RunningProcess> {
        let command_line = command.command_line();

        let mut cmd = tokio::process::Command::new(command.program());
        cmd.args(command.argv());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = self
            .console
            .with_attach_lock(|| cmd.spawn())
            .map_err(|e| BenchError::spawn_failed(command_line.clone(), e.to_string()))?;

        handle.attach(child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BenchError::Internal("无法获取stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BenchError::Internal("无法获取stderr".to_string()))?;

        info!("启动命令: pid={:?}, command={}", child.id(), command_line);

        Ok(RunningProcess {
            command_line,
            child,
            handle: handle.clone(),
            stdout_task: spawn_drain(stdout),
            stderr_task: spawn_drain(stderr),
            started: Instant::now(),
        })
    }

    /// 执行命令直到结束
    pub async fn execute(
        &self,
        command: &Command,
        handle: &ProcessHandle,
    ) -> BenchResult<WorkerResult> {
        self.spawn(command, handle)?.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn executor() -> ProcessExecutor {
        let (console, _) = Console::captured();
        ProcessExecutor::new(Arc::new(console))
    }

    fn sh(script: &str) -> Command {
        Command::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let result = executor()
            .execute(&sh("echo out; echo err 1>&2; exit 3"), &ProcessHandle::new())
            .await
            .unwrap();

        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        // 两个流都超过管道缓冲区
        let script = "i=0; while [ $i -lt 4000 ]; do \
                      echo xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx; \
                      echo yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy 1>&2; \
                      i=$((i+1)); done";
        let result = tokio::time::timeout(
            Duration::from_secs(30),
            executor().execute(&sh(script), &ProcessHandle::new()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.stdout.lines().count(), 4000);
        assert_eq!(result.stderr.lines().count(), 4000);
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = executor()
            .execute(
                &Command::new("/nonexistent/gfperf-missing"),
                &ProcessHandle::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_spawn_failure());
    }

    #[tokio::test]
    async fn test_kill_terminates_child() {
        let executor = executor();
        let handle = ProcessHandle::new();
        let running = executor.spawn(&sh("exec sleep 30"), &handle).unwrap();
        assert!(handle.pid().is_some());

        handle.kill();
        handle.kill();

        let result = tokio::time::timeout(Duration::from_secs(10), running.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.exit_code, None);
        assert_eq!(handle.pid(), None);

        // 子进程回收之后再kill也不会出错
        handle.kill();
    }

    #[tokio::test]
    async fn test_kill_before_spawn_terminates_next_child() {
        let executor = executor();
        let handle = ProcessHandle::new();
        handle.kill();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            executor.execute(&sh("exec sleep 30"), &handle),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.exit_code, None);
    }

    #[test]
    fn test_kill_without_child_is_noop() {
        let handle = ProcessHandle::new();
        handle.kill();
        assert!(handle.is_killed());
        assert_eq!(handle.pid(), None);
    }
}
