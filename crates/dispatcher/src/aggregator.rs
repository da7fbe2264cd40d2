//! 副本结果汇总
//!
//! 自动复制测试中每个副本输出一行结果，这里把它们合并为一行：
//! 数值字段分别取平均，标签中在标记段之后插入参与计算的副本数。
//!
//! ```text
//! gsi/autoreplica/create/1M = 10 bytes/sec 100 sec
//! gsi/autoreplica/create/1M = 20 bytes/sec 200 sec
//! gsi/autoreplica/create/1M = 30 bytes/sec 300 sec
//!   => gsi/autoreplica/create/3/1M = 20 bytes/sec 200 sec
//! ```

use tracing::{debug, warn};

pub const DEFAULT_VALUE_FIELD: usize = 2;
pub const DEFAULT_TIMING_FIELD: usize = 4;
pub const DEFAULT_MARKER: &str = "create";

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    value_field: usize,
    timing_field: usize,
    marker: String,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl ResultAggregator {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            value_field: DEFAULT_VALUE_FIELD,
            timing_field: DEFAULT_TIMING_FIELD,
            marker: marker.into(),
        }
    }

    pub fn with_fields(mut self, value_field: usize, timing_field: usize) -> Self {
        self.value_field = value_field;
        self.timing_field = timing_field;
        self
    }

    /// 合并各副本的结果行，没有任何副本产出结果时返回 `None`
    pub fn aggregate(&self, slots: &[Option<String>]) -> Option<String> {
        let lines: Vec<Vec<&str>> = slots
            .iter()
            .flatten()
            .filter_map(|text| text.lines().find(|l| !l.trim().is_empty()))
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .filter(|tokens| field(tokens, self.value_field).is_some())
            .collect();

        let first = lines.first()?;
        let count = lines.len();

        let mut tokens: Vec<String> = first.iter().map(|t| t.to_string()).collect();

        if let Some(avg) = average(&lines, self.value_field) {
            tokens[self.value_field] = format_number(avg);
        }
        if self.timing_field < tokens.len() {
            if let Some(avg) = average(&lines, self.timing_field) {
                tokens[self.timing_field] = format_number(avg);
            }
        }

        tokens[0] = self.insert_count(&tokens[0], count);

        debug!("汇总 {} 个副本结果: {}", count, tokens[0]);
        Some(tokens.join(" "))
    }

    fn insert_count(&self, label: &str, count: usize) -> String {
        let mut segments: Vec<String> = label.split('/').map(str::to_string).collect();
        match segments.iter().position(|s| *s == self.marker) {
            Some(pos) => {
                segments.insert(pos + 1, count.to_string());
                segments.join("/")
            }
            None => {
                warn!("标签中没有 '{}' 段，保留原标签: {}", self.marker, label);
                label.to_string()
            }
        }
    }
}

fn field(tokens: &[&str], index: usize) -> Option<f64> {
    tokens.get(index)?.parse::<f64>().ok()
}

fn average(lines: &[Vec<&str>], index: usize) -> Option<f64> {
    let values: Vec<f64> = lines.iter().filter_map(|t| field(t, index)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn format_number(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(value: u32, timing: u32) -> Option<String> {
        Some(format!(
            "gsi/autoreplica/create/1M = {value} bytes/sec {timing} sec\n"
        ))
    }

    #[test]
    fn test_three_replicas() {
        let aggregated = ResultAggregator::default()
            .aggregate(&[slot(10, 100), slot(20, 200), slot(30, 300)])
            .unwrap();
        assert_eq!(aggregated, "gsi/autoreplica/create/3/1M = 20 bytes/sec 200 sec");
    }

    #[test]
    fn test_absent_replica_excluded() {
        let aggregated = ResultAggregator::default()
            .aggregate(&[slot(10, 100), None, slot(20, 200)])
            .unwrap();
        assert_eq!(aggregated, "gsi/autoreplica/create/2/1M = 15 bytes/sec 150 sec");
    }

    #[test]
    fn test_no_replicas() {
        assert_eq!(ResultAggregator::default().aggregate(&[None, None]), None);
        assert_eq!(ResultAggregator::default().aggregate(&[]), None);
    }

    #[test]
    fn test_missing_marker_keeps_label() {
        let slots = [Some("gsi/replica/1M = 4 bytes/sec 2 sec".to_string())];
        let aggregated = ResultAggregator::default().aggregate(&slots).unwrap();
        assert_eq!(aggregated, "gsi/replica/1M = 4 bytes/sec 2 sec");
    }

    #[test]
    fn test_custom_marker_and_short_line() {
        let slots = [
            Some("k/copy/1M = 3 ops".to_string()),
            Some("k/copy/1M = 5 ops".to_string()),
        ];
        let aggregated = ResultAggregator::new("copy").aggregate(&slots).unwrap();
        assert_eq!(aggregated, "k/copy/2/1M = 4 ops");
    }

    #[test]
    fn test_unparseable_replica_skipped() {
        let slots = [
            Some("gsi/autoreplica/create/1M = failed".to_string()),
            slot(8, 80),
        ];
        let aggregated = ResultAggregator::default().aggregate(&slots).unwrap();
        assert_eq!(aggregated, "gsi/autoreplica/create/1/1M = 8 bytes/sec 80 sec");
    }
}
