pub mod app;
pub mod lock;
pub mod shutdown;

pub use app::{Application, RunOutcome};
pub use lock::ConfigLock;
pub use shutdown::SignalDispatcher;
