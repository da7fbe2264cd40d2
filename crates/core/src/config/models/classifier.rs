use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 连接gfmd时的常规提示，不属于错误
pub const DEFAULT_BENIGN_PATTERN: &str = "[1000058] connecting to gfmd";

/// 错误分类配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 包含这些子串的stderr行直接丢弃
    pub benign_patterns: Vec<String>,
    /// 错误日志文件，追加写入
    pub error_log: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            benign_patterns: vec![DEFAULT_BENIGN_PATTERN.to_string()],
            error_log: None,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.benign_patterns.iter().any(|p| p.is_empty()) {
            return Err(anyhow::anyhow!("良性模式不能为空字符串，否则会丢弃所有stderr"));
        }

        if let Some(path) = &self.error_log {
            if path.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("错误日志路径不能为空"));
            }
        }

        Ok(())
    }
}
