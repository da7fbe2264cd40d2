pub mod config;
pub mod console;
pub mod context;
pub mod errors;
pub mod logging;
pub mod models;
pub mod statistics;
pub mod traits;

pub use config::AppConfig;
pub use console::{CapturedOutput, Console};
pub use context::RunContext;
pub use errors::*;
pub use traits::{DiscardSink, ErrorMessageSink, MetricsRepository};
