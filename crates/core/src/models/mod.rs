//! # 数据模型
//!
//! 定义基准测试编排系统的核心数据结构：命令、Worker状态、执行结果以及
//! 持久化到指标库中的测量值、统计值、错误记录和执行时间窗口。
//!
//! ## 核心模型
//!
//! ### Command - 命令
//! 一次外部程序调用（程序 + 参数），可以带远程主机前缀（`ssh <host>`）。
//! 构造后不可变。
//!
//! ### WorkerState / ManagerState - 状态机
//! ```text
//! Worker:  Idle → Starting → Running → Completed{exit_code} → Idle (循环)
//!                                                ↘ Stopped (终态)
//! Manager: Idle → Running → {TimedOut | Interrupted} → Stopping → Stopped
//! ```
//!
//! ### BatchJob - 同步批次
//! 一组命令加一个共同的开始时间，每条命令都收到 `--wait <start>`。
//!
//! ### Measurement / Statistic - 指标
//! 测量值只追加、不修改；统计值总是从时间窗口内的测量值派生。
//!
//! ## 数据库映射
//!
//! - `data` 表 ← [`Measurement`]
//! - `statistics` 表 ← [`Statistic`]
//! - `error` 表 ← [`ErrorRecord`]
//! - `error_msg` 表 ← [`ErrorMessage`]
//! - `execute_time` 表 ← [`ExecutionWindow`]

pub mod batch;
pub mod command;
pub mod measurement;
pub mod worker;

pub use batch::*;
pub use command::*;
pub use measurement::*;
pub use worker::*;
