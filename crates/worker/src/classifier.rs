//! 错误分类与记录
//!
//! 把子进程的stderr分为 `ERROR`、`IGNORED`、`INTERRUPTED` 三类，
//! 输出到共享控制台、追加到错误日志文件，并把失败写入错误信息库。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use gfperf_core::config::ClassifierConfig;
use gfperf_core::models::{ClassifiedStatus, Command, ErrorMessage, WorkerResult};
use gfperf_core::{BenchError, ErrorMessageSink, RunContext};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 分类后的错误块
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub status: ClassifiedStatus,
    pub command: String,
    /// 已加上 `[STATUS] ` 前缀的行
    pub lines: Vec<String>,
}

impl ClassifiedError {
    /// 每行以换行结尾的错误文本
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// 输出到控制台的完整块
    pub fn console_block(&self) -> String {
        format!("[COMMAND] {}\n{}", self.command, self.text())
    }
}

/// 错误分类器
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    benign_patterns: Vec<String>,
}

impl FailureClassifier {
    pub fn new(benign_patterns: Vec<String>) -> Self {
        Self { benign_patterns }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(config.benign_patterns.clone())
    }

    pub fn status_for(exit_code: Option<i32>, interrupted: bool) -> ClassifiedStatus {
        if interrupted {
            ClassifiedStatus::Interrupted
        } else if exit_code == Some(0) {
            ClassifiedStatus::Ignored
        } else {
            ClassifiedStatus::Error
        }
    }

    pub fn is_benign(&self, line: &str) -> bool {
        self.benign_patterns.iter().any(|p| line.contains(p.as_str()))
    }

    /// 过滤良性行后剩余的stderr行
    pub fn surviving_lines<'a>(&self, stderr: &'a str) -> Vec<&'a str> {
        stderr.lines().filter(|l| !self.is_benign(l)).collect()
    }

    /// 分类一次调用的stderr，没有剩余行时返回 `None`
    pub fn classify(
        &self,
        command: &Command,
        stderr: &str,
        exit_code: Option<i32>,
        interrupted: bool,
    ) -> Option<ClassifiedError> {
        self.classify_as(command, stderr, Self::status_for(exit_code, interrupted))
    }

    /// 以指定分类处理stderr，没有剩余行时返回 `None`
    pub fn classify_as(
        &self,
        command: &Command,
        stderr: &str,
        status: ClassifiedStatus,
    ) -> Option<ClassifiedError> {
        let surviving = self.surviving_lines(stderr);
        if surviving.is_empty() {
            return None;
        }

        let lines = surviving
            .into_iter()
            .map(|line| format!("{status} {line}"))
            .collect();

        Some(ClassifiedError {
            status,
            command: command.command_line(),
            lines,
        })
    }

    /// 启动失败按ERROR处理，错误文本作为唯一一行
    pub fn classify_spawn_failure(&self, command: &Command, error: &BenchError) -> ClassifiedError {
        let status = ClassifiedStatus::Error;
        ClassifiedError {
            status,
            command: command.command_line(),
            lines: vec![format!("{status} {error}")],
        }
    }
}

/// 把分类后的错误输出、写日志、入库
#[derive(Clone)]
pub struct FailureLogger {
    ctx: Arc<RunContext>,
    classifier: Arc<FailureClassifier>,
    sink: Arc<dyn ErrorMessageSink>,
    // 错误日志文件和错误信息库共用一把锁
    record_lock: Arc<Mutex<()>>,
    error_log: Option<PathBuf>,
}

impl FailureLogger {
    pub fn new(
        ctx: Arc<RunContext>,
        classifier: FailureClassifier,
        sink: Arc<dyn ErrorMessageSink>,
        error_log: Option<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            classifier: Arc::new(classifier),
            sink,
            record_lock: Arc::new(Mutex::new(())),
            error_log,
        }
    }

    pub fn from_config(
        ctx: Arc<RunContext>,
        config: &ClassifierConfig,
        sink: Arc<dyn ErrorMessageSink>,
    ) -> Self {
        Self::new(
            ctx,
            FailureClassifier::from_config(config),
            sink,
            config.error_log.clone(),
        )
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    /// 报告一次调用的结果，返回分类（stderr全部为良性时为 `None`）
    pub async fn report(
        &self,
        command: &Command,
        result: &WorkerResult,
        interrupted: bool,
    ) -> Option<ClassifiedStatus> {
        let classified =
            self.classifier
                .classify(command, &result.stderr, result.exit_code, interrupted)?;
        self.emit(&classified).await;
        Some(classified.status)
    }

    /// 不看退出码，把stderr按ERROR报告；有输出被报告时返回 `true`
    pub async fn report_error_output(&self, command: &Command, stderr: &str) -> bool {
        match self
            .classifier
            .classify_as(command, stderr, ClassifiedStatus::Error)
        {
            Some(classified) => {
                self.emit(&classified).await;
                true
            }
            None => false,
        }
    }

    pub async fn report_spawn_failure(&self, command: &Command, error: &BenchError) {
        let classified = self.classifier.classify_spawn_failure(command, error);
        self.emit(&classified).await;
    }

    async fn emit(&self, classified: &ClassifiedError) {
        self.ctx.print(&classified.console_block());

        let _guard = self.record_lock.lock().await;

        if let Some(path) = &self.error_log {
            if let Err(e) = append_error_log(path, classified).await {
                warn!("写错误日志失败: path={}, error={}", path.display(), e);
            }
        }

        if !classified.status.is_failure() {
            debug!("中断导致的输出不计入错误: command={}", classified.command);
            return;
        }

        let count = self.ctx.record_error();
        debug!(
            "记录错误: status={}, command={}, count={}",
            classified.status.tag(),
            classified.command,
            count
        );

        let message = ErrorMessage {
            timestamp: self.ctx.started_at(),
            command: classified.command.clone(),
            message: classified.text(),
        };
        if let Err(e) = self.sink.record(&message).await {
            warn!("写入错误信息失败: command={}, error={}", message.command, e);
        }
    }
}

async fn append_error_log(path: &Path, classified: &ClassifiedError) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    let entry = format!(
        "{}\n{}\n{}",
        Local::now().format("%Y-%m-%d %H:%M:%S %z"),
        classified.command,
        classified.text()
    );
    file.write_all(entry.as_bytes()).await?;
    file.flush().await
}
