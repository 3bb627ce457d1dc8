pub mod worker_latency_milliseconds;
pub mod worker_latency_samples;

use crate::worker::WorkerSnapshot;

pub(self) const TYPE_COUNTER: &str = "counter";
pub(self) const TYPE_GAUGE: &str = "gauge";

pub(self) const HEADER_HELP: &str = "# HELP";
pub(self) const HEADER_TYPE: &str = "# TYPE";

type IterWorkersFn = fn(topic: &str, worker: &WorkerSnapshot, res: &mut Vec<String>);

/// Helper to apply a given [`IterWorkersFn`] to each of the `workers`.
pub fn iter_workers(workers: &[WorkerSnapshot], metrics_vec: &mut Vec<String>, topic: &str, iwf: IterWorkersFn) {
    for w in workers {
        iwf(topic, w, metrics_vec);
    }
}
