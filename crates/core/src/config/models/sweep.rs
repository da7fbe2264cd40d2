use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

use crate::models::FailurePolicy;

/// 单项基准测试的执行顺序
pub const SINGLE_TYPES: [&str; 7] = [
    "metadata",
    "tree",
    "copy",
    "read",
    "write",
    "replica",
    "autoreplica",
];

const MAX_START_OFFSET_SECONDS: u64 = 24 * 60 * 60;

/// 基准测试选项的值
///
/// `true` 只输出选项名，`false` 省略该选项。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// 选项后面跟随的参数，没有参数时返回 `None`
    pub fn as_arg(&self) -> Option<String> {
        match self {
            OptionValue::Flag(_) => None,
            OptionValue::Text(s) if s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(b) => write!(f, "{b}"),
            OptionValue::Integer(i) => write!(f, "{i}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// 按配置文件中的顺序保存的分组
pub type GroupMap<V> = IndexMap<String, V>;

/// 一组基准测试选项
pub type BenchOptions = BTreeMap<String, OptionValue>;

/// 把选项渲染为 `--name value` 形式的参数列表
pub fn render_options(options: &BenchOptions) -> Vec<String> {
    let mut args = Vec::with_capacity(options.len() * 2);
    for (name, value) in options {
        if matches!(value, OptionValue::Flag(false)) {
            continue;
        }
        args.push(format!("--{name}"));
        if let Some(arg) = value.as_arg() {
            args.push(arg);
        }
    }
    args
}

/// 并行组中的一个成员
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelMember {
    /// 对应 `gfperf-parallel-<type>`
    #[serde(rename = "type")]
    pub kind: String,
    /// 远程执行的主机
    #[serde(default)]
    pub rhost: Option<String>,
    #[serde(flatten)]
    pub options: BenchOptions,
}

/// 定时基准测试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// 认证方式，同时作为结果key的前缀
    pub authentication: Vec<String>,
    pub wrapper: String,
    /// 远程主机上wrapper和测试程序所在目录
    pub remote_path: Option<String>,
    pub start_offset_seconds: u64,
    /// 测试前检查服务器状态的命令
    pub precheck_command: Option<String>,
    /// 测试类型 -> 选项列表
    pub single: GroupMap<Vec<BenchOptions>>,
    /// 组名 -> 成员列表，按配置顺序执行
    pub parallel: GroupMap<Vec<ParallelMember>>,
    /// 组名 -> 副本选项列表，按配置顺序执行
    pub parallel_autoreplica: GroupMap<Vec<BenchOptions>>,
    /// 汇总标签中副本数插入在这一段之后
    pub aggregate_marker: String,
    pub failure_policy: FailurePolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            authentication: vec!["sharedsecret".to_string()],
            wrapper: "gfperf-wrapper.sh".to_string(),
            remote_path: None,
            start_offset_seconds: 5,
            precheck_command: Some("gfsched".to_string()),
            single: GroupMap::new(),
            parallel: GroupMap::new(),
            parallel_autoreplica: GroupMap::new(),
            aggregate_marker: "create".to_string(),
            failure_policy: FailurePolicy::Continue,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.authentication.is_empty() {
            return Err(anyhow::anyhow!("至少需要一种认证方式"));
        }

        if self.authentication.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow::anyhow!("认证方式不能为空"));
        }

        if self.wrapper.trim().is_empty() {
            return Err(anyhow::anyhow!("wrapper命令不能为空"));
        }

        if self.start_offset_seconds > MAX_START_OFFSET_SECONDS {
            return Err(anyhow::anyhow!(
                "启动偏移不能超过{}秒",
                MAX_START_OFFSET_SECONDS
            ));
        }

        for kind in self.single.keys() {
            if !SINGLE_TYPES.contains(&kind.as_str()) {
                return Err(anyhow::anyhow!(
                    "未知的测试类型: {}, 有效值: {:?}",
                    kind,
                    SINGLE_TYPES
                ));
            }
        }

        for (group, members) in &self.parallel {
            if members.iter().any(|m| m.kind.trim().is_empty()) {
                return Err(anyhow::anyhow!("并行组 '{}' 中存在未指定type的成员", group));
            }
        }

        let duplicated = self.duplicate_group_names();
        if !duplicated.is_empty() {
            return Err(anyhow::anyhow!("重复的组名: {}", duplicated.join(", ")));
        }

        if self.aggregate_marker.trim().is_empty() {
            return Err(anyhow::anyhow!("汇总标记不能为空"));
        }

        Ok(())
    }

    /// 同时出现在 `parallel` 和 `parallel_autoreplica` 中的组名
    pub fn duplicate_group_names(&self) -> Vec<String> {
        let parallel: BTreeSet<&String> = self.parallel.keys().collect();
        self.parallel_autoreplica
            .keys()
            .filter(|name| parallel.contains(name))
            .cloned()
            .collect()
    }
}
