//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML配置文件、`GFPERF_` 前缀的环境变量。
//! 每个配置段都有自己的 `validate()`，由 [`AppConfig::validate`] 串联。
//!
//! ```toml
//! [database]
//! url = "sqlite://gfperf.db"
//! statistics_window = "30 days"
//!
//! [stress]
//! commands = ["gfperf-metadata -t gfarm:///stress/metadata/0 -n 500"]
//! timeout_seconds = 300
//!
//! [sweep]
//! authentication = ["sharedsecret", "gsi"]
//!
//! [[sweep.single.metadata]]
//! testdir = "gfarm:///tmp"
//! number = 250
//! ```

pub mod models;

#[cfg(test)]
mod tests;

pub use models::*;
