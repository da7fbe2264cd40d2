use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 一条持久化的测量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub value: f64,
    pub unit: String,
    pub exec_time: Option<f64>,
    pub exec_unit: Option<String>,
}

/// 某个key在时间窗口内的滚动统计值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub timestamp: DateTime<Utc>,
    pub key: String,
    pub average: f64,
    pub stddev: f64,
}

/// 一次运行的错误计数（仅在有错误时写入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

/// 单次失败调用的错误信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub message: String,
}

/// 一次完整运行的起止时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Measurement {
    /// 解析一行工作负载输出
    ///
    /// 格式为 `<key> = <value> <unit>` 或
    /// `<key> = <value> <unit> <exec_time> <exec_unit>`，其他格式返回 `None`。
    pub fn parse_line(line: &str, timestamp: DateTime<Utc>) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 || tokens[1] != "=" {
            return None;
        }

        let value = tokens.get(2)?.parse::<f64>().ok()?;
        match tokens.len() {
            4 => Some(Self {
                timestamp,
                key: tokens[0].to_string(),
                value,
                unit: tokens[3].to_string(),
                exec_time: None,
                exec_unit: None,
            }),
            6 => Some(Self {
                timestamp,
                key: tokens[0].to_string(),
                value,
                unit: tokens[3].to_string(),
                exec_time: Some(tokens[4].parse::<f64>().ok()?),
                exec_unit: Some(tokens[5].to_string()),
            }),
            _ => None,
        }
    }
}

/// 把一次运行汇总的结果文本解析为测量值列表
///
/// 同一次运行中重复出现的key只保留第一条。
pub fn parse_measurements(text: &str, timestamp: DateTime<Utc>) -> Vec<Measurement> {
    let mut seen = HashSet::new();
    let mut measurements = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match Measurement::parse_line(line, timestamp) {
            Some(measurement) => {
                if seen.insert(measurement.key.clone()) {
                    measurements.push(measurement);
                } else {
                    warn!("同一次运行中出现重复的key，忽略: {}", measurement.key);
                }
            }
            None => debug!("跳过无法解析的结果行: {}", line),
        }
    }

    measurements
}
