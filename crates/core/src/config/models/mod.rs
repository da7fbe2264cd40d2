pub mod app_config;
pub mod classifier;
pub mod database;
pub mod logging;
pub mod stress;
pub mod sweep;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use classifier::{ClassifierConfig, DEFAULT_BENIGN_PATTERN};
pub use database::DatabaseConfig;
pub use logging::LoggingConfig;
pub use stress::{StressConfig, StressWorkloadConfig};
pub use sweep::{
    render_options, BenchOptions, GroupMap, OptionValue, ParallelMember, SweepConfig,
    SINGLE_TYPES,
};
