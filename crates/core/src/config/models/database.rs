use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::statistics::parse_span;

/// 结果数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 滚动统计的时间窗口，例如 `"30 days"`
    pub statistics_window: String,
    /// 运行结束后把数据库文件复制到这里
    pub backup_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://gfperf.db".to_string(),
            max_connections: 5,
            statistics_window: "30 days".to_string(),
            backup_path: None,
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }

        if !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("数据库URL必须是SQLite格式"));
        }

        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }

        self.statistics_window()?;

        if let Some(path) = &self.backup_path {
            if path.trim().is_empty() {
                return Err(anyhow::anyhow!("备份路径不能为空字符串"));
            }
        }

        Ok(())
    }

    pub fn statistics_window(&self) -> anyhow::Result<chrono::Duration> {
        parse_span(&self.statistics_window)
            .with_context(|| format!("无效的统计窗口: {}", self.statistics_window))
    }
}
