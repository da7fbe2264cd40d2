pub mod aggregator;
pub mod batch;
pub mod sweep;

pub use aggregator::ResultAggregator;
pub use batch::{prefix_lines, BatchOutput, ParallelBatch, RunningBatch};
pub use sweep::{BenchmarkSweep, SweepReport};
