use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 单个Worker（Runner）的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Idle,
    Starting,
    Running,
    Completed { exit_code: Option<i32> },
    /// 终态：被显式停止
    Stopped,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

/// Manager（Supervisor）的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerState {
    Idle,
    Running,
    TimedOut,
    Interrupted,
    Stopping,
    Stopped,
}

/// 一次进程调用的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerResult {
    pub stdout: String,
    pub stderr: String,
    /// 被信号终止时为 `None`
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl WorkerResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 错误分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifiedStatus {
    /// 非零退出码（或启动失败）
    Error,
    /// 退出码为0但stderr有输出
    Ignored,
    /// 由停止请求导致的终止，不计为工作负载失败
    Interrupted,
}

impl ClassifiedStatus {
    pub fn tag(&self) -> &'static str {
        match self {
            ClassifiedStatus::Error => "ERROR",
            ClassifiedStatus::Ignored => "IGNORED",
            ClassifiedStatus::Interrupted => "INTERRUPTED",
        }
    }

    /// 是否计入运行的错误计数并写入错误信息库
    pub fn is_failure(&self) -> bool {
        !matches!(self, ClassifiedStatus::Interrupted)
    }
}

impl fmt::Display for ClassifiedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tag())
    }
}

/// 遇到失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 记录后继续
    #[default]
    Continue,
    /// 第一次非零退出时停止同组的其他Worker
    StopOnFirstFailure,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "stop_on_first_failure" => Ok(FailurePolicy::StopOnFirstFailure),
            _ => Err(format!(
                "Invalid failure policy: {s}. Valid policies: continue, stop_on_first_failure"
            )),
        }
    }
}
