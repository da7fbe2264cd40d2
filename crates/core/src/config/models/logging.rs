use serde::{Deserialize, Serialize};

/// 诊断日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` 或 `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}, 有效值: {:?}",
                self.level,
                valid_levels
            ));
        }

        if !matches!(self.format.as_str(), "json" | "pretty") {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}, 有效值: json, pretty",
                self.format
            ));
        }

        Ok(())
    }
}
