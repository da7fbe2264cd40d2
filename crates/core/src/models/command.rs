use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BenchError, Result};

/// 远程执行使用的shell前缀
pub const REMOTE_SHELL: &str = "ssh";

/// 外部命令
///
/// 由程序名和参数列表组成，可选地在远程主机上通过 `ssh <host>` 执行。
/// 所有构造方法都消耗 `self` 并返回新值，构造完成后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    program: String,
    args: Vec<String>,
    host: Option<String>,
    group: Option<String>,
}

impl Command {
    /// 创建只有程序名的命令
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            host: None,
            group: None,
        }
    }

    /// 从命令行字符串解析（按空白分割）
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens
            .next()
            .ok_or_else(|| BenchError::Parse("命令行不能为空".to_string()))?;
        Ok(Self::new(program).args(tokens))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 指定远程主机，`None` 表示本地执行
    pub fn on_host(mut self, host: Option<String>) -> Self {
        self.host = host.filter(|h| !h.is_empty());
        self
    }

    /// 指定所属的并行组名
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// 实际要执行的程序（远程时为ssh）
    pub fn program(&self) -> &str {
        match self.host {
            Some(_) => REMOTE_SHELL,
            None => &self.program,
        }
    }

    /// 实际传给程序的参数
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        if let Some(ref host) = self.host {
            argv.push(host.clone());
            argv.push(self.program.clone());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// 用于日志和错误记录的完整命令行
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program().to_string()];
        parts.extend(self.argv());
        parts.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}
