use thiserror::Error;

/// 基准测试编排错误类型定义
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("启动命令失败: {command} - {reason}")]
    Spawn { command: String, reason: String },

    #[error("解析错误: {0}")]
    Parse(String),

    #[error("任务等待失败: {0}")]
    TaskJoin(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl BenchError {
    pub fn spawn_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// 是否为单次命令启动失败（只影响该次调用，不影响整个运行）
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

impl From<tokio::task::JoinError> for BenchError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskJoin(e.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, BenchError>;

/// 统一的Result类型（显式命名）
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_message() {
        let err = BenchError::spawn_failed("gfperf-read -t /tmp", "No such file or directory");
        assert!(err.is_spawn_failure());
        let message = err.to_string();
        assert!(message.contains("gfperf-read -t /tmp"));
        assert!(message.contains("No such file or directory"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: BenchError = io.into();
        assert!(matches!(err, BenchError::Io(_)));
        assert!(!err.is_spawn_failure());
    }
}
