pub mod sqlite;

pub use sqlite::{DatabaseManager, SqliteMetricsRepository};
