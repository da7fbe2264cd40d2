//! 滚动统计计算
//!
//! 均值和总体标准差（除以N而不是N-1），以及统计窗口长度的解析。

use chrono::Duration;

use crate::{BenchError, Result};

/// 一组数值的总体统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationStats {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// 计算均值和总体标准差，空输入返回 `None`
pub fn population_stats(values: &[f64]) -> Option<PopulationStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Some(PopulationStats {
        count: values.len(),
        mean,
        stddev: variance.sqrt(),
    })
}

/// 解析 `"30 days"`、`"12hours"`、`"1 week"` 形式的时间跨度
///
/// 1个月按30天计算。
pub fn parse_span(span: &str) -> Result<Duration> {
    let span = span.trim();
    let split = span
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(span.len());
    let (number, unit) = span.split_at(split);

    let number: i64 = if number.is_empty() {
        0
    } else {
        number
            .parse()
            .map_err(|e| BenchError::Parse(format!("无效的时间跨度 '{span}': {e}")))?
    };

    let seconds_per_unit = match unit.trim() {
        "sec" | "second" | "secs" | "seconds" => 1,
        "min" | "minute" | "mins" | "minutes" => 60,
        "hour" | "hours" => 60 * 60,
        "day" | "days" => 24 * 60 * 60,
        "week" | "weeks" => 7 * 24 * 60 * 60,
        "month" | "months" => 30 * 24 * 60 * 60,
        other => {
            return Err(BenchError::Parse(format!(
                "无效的时间单位 '{other}' (时间跨度: '{span}')"
            )))
        }
    };

    number
        .checked_mul(seconds_per_unit)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| BenchError::Parse(format!("时间跨度超出范围: '{span}'")))
}
