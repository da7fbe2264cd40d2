//! 按集群中的gfsd生成压力测试命令
//!
//! 每个并发序号 `i` 使用独立的目录 `<top>/<kind>/<i>`，
//! 复制测试把gfsd排成一个环，每台把文件复制到下一台。

use std::path::PathBuf;

use gfperf_core::config::StressWorkloadConfig;
use gfperf_core::models::Command;
use gfperf_core::{BenchError, BenchResult};
use tracing::{debug, info, warn};

use crate::executor::{ProcessExecutor, ProcessHandle};

/// 各类测试在测试目录下的子目录
const GFARM_SUBDIRS: [&str; 4] = ["gfpcopy", "metadata", "tree", "io"];
const GFARM2FS_SUBDIRS: [&str; 3] = ["metadata2", "tree2", "io2"];

/// 复制测试的源和目标，按环形配对
pub fn replica_ring(hosts: &[String]) -> Vec<(&str, &str)> {
    if hosts.len() < 2 {
        return Vec::new();
    }
    hosts
        .iter()
        .zip(hosts.iter().cycle().skip(1))
        .map(|(src, dst)| (src.as_str(), dst.as_str()))
        .collect()
}

/// 从 `gfarm:///dir` 得到挂载点下的路径
fn mounted_path(mount: &str, testdir: &str) -> String {
    let path = testdir.strip_prefix("gfarm://").unwrap_or(testdir);
    format!("{}{}", mount.trim_end_matches('/'), path)
}

/// 一次压力测试的目录布局和命令集
#[derive(Debug, Clone)]
pub struct StressWorkload {
    top_dir: String,
    local_dir: PathBuf,
    gfarm2fs: Option<String>,
    full_path: Option<String>,
    hosts: Vec<String>,
    multiplex: usize,
}

impl StressWorkload {
    /// 目录名带上主机名和pid，同时运行的多个实例互不干扰
    pub fn new(
        config: &StressWorkloadConfig,
        hosts: Vec<String>,
        multiplex: usize,
        hostname: &str,
        pid: u32,
    ) -> Self {
        let tag = format!("{hostname}-{pid}");
        let top_dir = format!("{}/{}", config.testdir.trim_end_matches('/'), tag);
        let local_dir = PathBuf::from(&config.localdir).join(format!("gfstress-{pid}"));
        let full_path = config
            .gfarm2fs
            .as_deref()
            .map(|mount| format!("{}/{}", mounted_path(mount, &config.testdir), tag));

        Self {
            top_dir,
            local_dir,
            gfarm2fs: config.gfarm2fs.clone(),
            full_path,
            hosts,
            multiplex,
        }
    }

    /// 运行 `host_command` 取得可写的gfsd列表
    pub async fn discover_hosts(
        executor: &ProcessExecutor,
        host_command: &str,
    ) -> BenchResult<Vec<String>> {
        let command = Command::parse(host_command)?;
        let result = executor.execute(&command, &ProcessHandle::new()).await?;
        if !result.success() {
            return Err(BenchError::spawn_failed(
                command.command_line(),
                format!("exit_code={:?}: {}", result.exit_code, result.stderr.trim()),
            ));
        }

        let hosts: Vec<String> = result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            return Err(BenchError::Internal("no gfsd!".to_string()));
        }

        info!("发现gfsd: {}", hosts.join(", "));
        Ok(hosts)
    }

    pub fn top_dir(&self) -> &str {
        &self.top_dir
    }

    pub fn local_dir(&self) -> &std::path::Path {
        &self.local_dir
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// 在分布式文件系统上建目录的命令，按执行顺序
    pub fn setup_commands(&self) -> Vec<Command> {
        let mut commands = vec![
            Command::new("gfmkdir").args(["-p", self.top_dir.as_str()]),
            Command::new("gfncopy").args(["-s", "1", self.top_dir.as_str()]),
        ];

        for i in 0..self.multiplex {
            for sub in GFARM_SUBDIRS {
                commands.push(Command::new("gfmkdir").arg("-p").arg(self.dir(sub, i)));
            }
            if self.gfarm2fs.is_some() {
                for sub in GFARM2FS_SUBDIRS {
                    commands.push(Command::new("gfmkdir").arg("-p").arg(self.dir(sub, i)));
                }
            }
        }
        commands
    }

    fn dir(&self, sub: &str, i: usize) -> String {
        format!("{}/{}/{}", self.top_dir, sub, i)
    }

    fn local(&self, i: usize) -> String {
        self.local_dir
            .join("gfpcopy")
            .join(i.to_string())
            .display()
            .to_string()
    }

    /// 全部压力测试命令
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        for i in 0..self.multiplex {
            let io = self.dir("io", i);

            commands.push(Command::new("gfpcopy-test.sh").args([
                "-g".to_string(),
                self.dir("gfpcopy", i),
                "-l".to_string(),
                self.local(i),
            ]));
            commands.push(
                Command::new("gfperf-metadata")
                    .arg("-t")
                    .arg(self.dir("metadata", i))
                    .args(["-n", "500"]),
            );
            commands.push(
                Command::new("gfperf-tree")
                    .arg("-t")
                    .arg(self.dir("tree", i))
                    .args(["-w", "3", "-d", "5"]),
            );
            for host in &self.hosts {
                for kind in ["gfperf-read", "gfperf-write"] {
                    commands.push(Command::new(kind).args([
                        "-t",
                        io.as_str(),
                        "-l",
                        "1G",
                        "-g",
                        host.as_str(),
                        "-k",
                        "-1",
                    ]));
                }
            }
            for (src, dst) in replica_ring(&self.hosts) {
                commands.push(Command::new("gfperf-replica").args([
                    "-s",
                    src,
                    "-d",
                    dst,
                    "-l",
                    "1M",
                    "-t",
                    io.as_str(),
                ]));
            }

            if let (Some(mount), Some(full_path)) = (&self.gfarm2fs, &self.full_path) {
                let io2 = self.dir("io2", i);
                commands.push(Command::new("gfperf-metadata").args([
                    "-t".to_string(),
                    format!("file://{full_path}/metadata2/{i}"),
                    "-n".to_string(),
                    "500".to_string(),
                ]));
                commands.push(Command::new("gfperf-tree").args([
                    "-t".to_string(),
                    format!("file://{full_path}/tree2/{i}"),
                    "-w".to_string(),
                    "3".to_string(),
                    "-d".to_string(),
                    "5".to_string(),
                ]));
                for host in &self.hosts {
                    for kind in ["gfperf-read", "gfperf-write"] {
                        commands.push(Command::new(kind).args([
                            "-t",
                            io2.as_str(),
                            "-m",
                            mount.as_str(),
                            "-l",
                            "1G",
                            "-g",
                            host.as_str(),
                            "-k",
                            "-1",
                        ]));
                    }
                }
            }
        }

        debug!("生成压力测试命令: {} 个", commands.len());
        commands
    }

    /// 建本地目录
    pub async fn prepare_local(&self) -> BenchResult<()> {
        for i in 0..self.multiplex {
            tokio::fs::create_dir_all(self.local(i)).await?;
        }
        Ok(())
    }

    /// 建好全部测试目录，任何一步失败都终止准备
    pub async fn prepare(&self, executor: &ProcessExecutor) -> BenchResult<()> {
        for command in self.setup_commands() {
            let result = executor.execute(&command, &ProcessHandle::new()).await?;
            if !result.success() {
                return Err(BenchError::spawn_failed(
                    command.command_line(),
                    format!("exit_code={:?}: {}", result.exit_code, result.stderr.trim()),
                ));
            }
        }
        self.prepare_local().await?;
        info!("测试目录已就绪: {}", self.top_dir);
        Ok(())
    }

    /// 删除测试目录，失败只记录
    pub async fn cleanup(&self, executor: &ProcessExecutor) {
        let command = Command::new("gfrm").args(["-rf", self.top_dir.as_str()]);
        match executor.execute(&command, &ProcessHandle::new()).await {
            Ok(result) if result.success() => {}
            Ok(result) => warn!(
                "删除测试目录失败: {}, exit_code={:?}",
                self.top_dir, result.exit_code
            ),
            Err(e) => warn!("删除测试目录失败: {}: {}", self.top_dir, e),
        }
        self.cleanup_local().await;
    }

    pub async fn cleanup_local(&self) {
        match tokio::fs::remove_dir_all(&self.local_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("删除本地目录失败: {}: {}", self.local_dir.display(), e),
        }
    }
}

pub fn hostname() -> BenchResult<String> {
    let name = nix::unistd::gethostname().map_err(std::io::Error::from)?;
    Ok(name.to_string_lossy().into_owned())
}
