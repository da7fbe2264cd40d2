use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    classifier::ClassifierConfig, database::DatabaseConfig, logging::LoggingConfig,
    stress::StressConfig, sweep::SweepConfig,
};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/gfperf.toml",
    "gfperf.toml",
    "/etc/gfperf/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub classifier: ClassifierConfig,
    pub stress: StressConfig,
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: GFPERF, separator: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = Self::default_path() {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        // 环境变量优先级最高，例如 GFPERF_STRESS__TIMEOUT_SECONDS=60
        builder = builder.add_source(
            Environment::with_prefix("GFPERF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 第一个存在的默认配置文件
    pub fn default_path() -> Option<&'static str> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .copied()
            .find(|path| Path::new(path).exists())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        self.classifier.validate().context("错误分类配置验证失败")?;
        self.stress.validate().context("压力测试配置验证失败")?;
        self.sweep.validate().context("基准测试配置验证失败")?;

        Ok(())
    }
}
