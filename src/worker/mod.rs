// Inner modules
mod buffer;
mod latency;
mod partition_worker;

// Exports
pub use latency::LatencySnapshot;
pub use partition_worker::{Worker, WorkerSnapshot, WorkerState};
