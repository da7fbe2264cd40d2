use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{Command, FailurePolicy};

/// 按集群中的gfsd自动生成压力测试命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressWorkloadConfig {
    /// 分布式文件系统上的测试目录
    pub testdir: String,
    /// 本地测试目录
    pub localdir: String,
    /// gfarm2fs挂载点，设置后追加经由挂载点的测试
    pub gfarm2fs: Option<String>,
    /// 列出可写gfsd的命令，每行一个主机
    pub host_command: String,
}

impl Default for StressWorkloadConfig {
    fn default() -> Self {
        Self {
            testdir: "gfarm:///stress".to_string(),
            localdir: "/tmp".to_string(),
            gfarm2fs: None,
            host_command: "gfsched -w".to_string(),
        }
    }
}

impl StressWorkloadConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.testdir.trim().is_empty() {
            return Err(anyhow::anyhow!("测试目录不能为空"));
        }

        if self.localdir.trim().is_empty() {
            return Err(anyhow::anyhow!("本地测试目录不能为空"));
        }

        if matches!(&self.gfarm2fs, Some(dir) if dir.trim().is_empty()) {
            return Err(anyhow::anyhow!("gfarm2fs挂载点不能为空字符串"));
        }

        Command::parse(&self.host_command)
            .with_context(|| format!("无效的gfsd列表命令: '{}'", self.host_command))?;

        Ok(())
    }
}

/// 持续压力测试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// 每行一个命令
    pub commands: Vec<String>,
    /// 设置后按gfsd生成命令，与 `commands` 一起执行
    pub workload: Option<StressWorkloadConfig>,
    /// 每个命令的并发副本数
    pub multiplex: usize,
    /// 0表示不设超时
    pub timeout_seconds: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            workload: None,
            multiplex: 1,
            timeout_seconds: 300,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

impl StressConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.multiplex == 0 {
            return Err(anyhow::anyhow!("并发副本数必须大于0"));
        }

        for line in &self.commands {
            Command::parse(line).with_context(|| format!("无效的压力测试命令: '{line}'"))?;
        }

        if let Some(workload) = &self.workload {
            workload.validate()?;
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// 按副本数展开后的全部命令
    pub fn expanded_commands(&self) -> anyhow::Result<Vec<Command>> {
        let mut commands = Vec::with_capacity(self.commands.len() * self.multiplex);
        for _ in 0..self.multiplex {
            for line in &self.commands {
                commands.push(
                    Command::parse(line)
                        .with_context(|| format!("无效的压力测试命令: '{line}'"))?,
                );
            }
        }
        Ok(commands)
    }
}
