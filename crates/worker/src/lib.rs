//! 进程执行与持续压力测试
//!
//! - `executor` - 启动外部命令并并发读取stdout/stderr
//! - `classifier` - stderr分类、输出和错误记录
//! - `runner` - 反复执行同一命令的Worker
//! - `manager` - 全部Runner的监督者（超时、中断、失败策略）
//! - `workload` - 按gfsd生成压力测试命令和测试目录

pub mod classifier;
pub mod executor;
pub mod manager;
pub mod runner;
pub mod workload;

pub use classifier::{ClassifiedError, FailureClassifier, FailureLogger};
pub use executor::{ProcessExecutor, ProcessHandle, RunningProcess};
pub use manager::Manager;
pub use runner::{Runner, RunnerFailure, SPAWN_RETRY_DELAY};
pub use workload::{replica_ring, StressWorkload};
