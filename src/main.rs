use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use gfperf::{Application, ConfigLock, RunOutcome, SignalDispatcher};
use gfperf_core::logging::init_from_config;
use gfperf_core::{AppConfig, Console};
use tracing::{info, warn};

fn cli() -> Command {
    Command::new("gfperf")
        .version("1.0.0")
        .about("分布式存储集群基准测试编排工具")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别（覆盖配置文件）")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式（覆盖配置文件）")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("stress").about("持续压力测试").arg(
                Arg::new("timeout")
                    .short('t')
                    .long("timeout")
                    .value_name("SECONDS")
                    .help("运行时长，0表示不限")
                    .value_parser(clap::value_parser!(u64)),
            ),
        )
        .subcommand(
            Command::new("sweep").about("定时基准测试").arg(
                Arg::new("check")
                    .long("check")
                    .help("只检查配置文件")
                    .action(ArgAction::SetTrue),
            ),
        )
}

/// `-c` 指定的配置文件，否则为第一个存在的默认配置文件
fn config_path(matches: &ArgMatches) -> Option<&str> {
    matches
        .get_one::<String>("config")
        .map(String::as_str)
        .or_else(|| AppConfig::default_path())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config_path = config_path(&matches);

    let mut config = AppConfig::load(config_path).with_context(|| {
        format!("加载配置文件失败: {}", config_path.unwrap_or("<默认配置>"))
    })?;

    // 初始化日志系统
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }
    init_from_config(&config.logging)?;

    match matches.subcommand() {
        Some(("stress", sub)) => {
            if let Some(timeout) = sub.get_one::<u64>("timeout") {
                config.stress.timeout_seconds = *timeout;
            }
            run(config, Mode::Stress).await
        }
        Some(("sweep", sub)) => {
            if sub.get_flag("check") {
                println!("{} is ok.", config_path.unwrap_or("configuration"));
                return Ok(ExitCode::SUCCESS);
            }

            let _lock = match config_path {
                Some(path) => match ConfigLock::try_acquire(path)? {
                    Some(lock) => Some(lock),
                    None => {
                        println!("config file is locked.");
                        println!("another process is running on same config file.");
                        return Ok(ExitCode::SUCCESS);
                    }
                },
                None => {
                    warn!("没有配置文件，跳过配置文件锁");
                    None
                }
            };
            run(config, Mode::Sweep).await
        }
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Stress,
    Sweep,
}

async fn run(config: AppConfig, mode: Mode) -> Result<ExitCode> {
    info!("启动gfperf: mode={:?}", mode);

    let app = Application::new(config, Arc::new(Console::stdout()));
    let signals = SignalDispatcher::new(Arc::clone(app.context())).spawn()?;

    let outcome = match mode {
        Mode::Stress => app.run_stress().await,
        Mode::Sweep => app.run_sweep().await,
    };
    signals.abort();

    let outcome = outcome?;
    info!("gfperf已退出: {:?}", outcome);
    Ok(match outcome {
        RunOutcome::Completed | RunOutcome::Interrupted => ExitCode::SUCCESS,
        RunOutcome::PrecheckFailed => ExitCode::FAILURE,
    })
}
