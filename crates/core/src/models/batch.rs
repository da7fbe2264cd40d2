use chrono::{DateTime, Duration, Utc};

use super::Command;

/// `--wait` 参数的时间格式（UTC）
pub const WAIT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 一组需要在同一时刻开始的命令
///
/// 同步由测试程序自身根据 `--wait <start>` 完成，这里只负责计算开始时间
/// 并把它附加到每条命令上。
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    commands: Vec<Command>,
    start_at: DateTime<Utc>,
}

impl BatchJob {
    /// 开始时间为当前时间加上 `offset`
    pub fn new(commands: Vec<Command>, offset: Duration) -> Self {
        Self::starting_at(commands, Utc::now() + offset)
    }

    pub fn starting_at(commands: Vec<Command>, start_at: DateTime<Utc>) -> Self {
        Self { commands, start_at }
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn wait_arg(&self) -> String {
        self.start_at.format(WAIT_FORMAT).to_string()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 附加了 `--wait <start>` 的命令，顺序与构造时一致
    pub fn scheduled_commands(&self) -> Vec<Command> {
        let wait = self.wait_arg();
        self.commands
            .iter()
            .cloned()
            .map(|command| command.arg("--wait").arg(wait.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wait_arg_format() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let job = BatchJob::starting_at(vec![], start);
        assert_eq!(job.wait_arg(), "2024-03-09T07:05:01Z");
        assert!(job.is_empty());
    }

    #[test]
    fn test_every_command_gets_same_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let job = BatchJob::starting_at(
            vec![
                Command::new("gfperf-parallel-read").arg("--name").arg("g1"),
                Command::new("gfperf-parallel-write").on_host(Some("host2".to_string())),
            ],
            start,
        );

        let commands = job.scheduled_commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0].command_line(),
            "gfperf-parallel-read --name g1 --wait 2024-01-01T00:00:00Z"
        );
        assert_eq!(
            commands[1].command_line(),
            "ssh host2 gfperf-parallel-write --wait 2024-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_default_offset_is_in_future() {
        let before = Utc::now();
        let job = BatchJob::new(vec![], Duration::seconds(5));
        assert!(job.start_at() >= before + Duration::seconds(5));
    }
}
