use const_format::formatcp;

use crate::worker::WorkerSnapshot;

use super::super::{LABEL_PARTITION_INDEX, LABEL_TOPIC, NAMESPACE};
use super::{HEADER_HELP, HEADER_TYPE, TYPE_COUNTER};

const NAME: &str = formatcp!("{NAMESPACE}_worker_latency_samples_total");
const HELP: &str =
    formatcp!("{HEADER_HELP} {NAME} Records whose latency was measured by the worker.");
const TYPE: &str = formatcp!("{HEADER_TYPE} {NAME} {TYPE_COUNTER}");

pub(crate) fn append_headers(res: &mut Vec<String>) {
    res.push(HELP.into());
    res.push(TYPE.into());
}

pub(crate) fn append_metric(topic: &str, worker: &WorkerSnapshot, res: &mut Vec<String>) {
    let partition_index = worker.partition_index;
    let count = worker.latency.count;

    res.push(format!(
        "{NAME}\
        {{\
            {LABEL_TOPIC}=\"{topic}\",\
            {LABEL_PARTITION_INDEX}=\"{partition_index}\"\
        }} \
        {count}"
    ));
}

#[cfg(test)]
mod test {
    use super::{append_headers, append_metric};
    use crate::worker::{LatencySnapshot, WorkerSnapshot, WorkerState};

    #[test]
    fn test_append() {
        let w = WorkerSnapshot {
            partition_index: 1,
            state: WorkerState::Stopped,
            latency: LatencySnapshot {
                min: Some(3),
                max: Some(9),
                average: 6,
                sum: 42,
                count: 7,
            },
            buffered_messages: 0,
        };

        let mut res = Vec::new();
        append_headers(&mut res);
        append_metric("perf-topic", &w, &mut res);

        assert_eq!(res.len(), 3);
        assert!(res[0].starts_with("# HELP pfk_worker_latency_samples_total "));
        assert_eq!(res[1], "# TYPE pfk_worker_latency_samples_total counter");
        assert_eq!(res[2], "pfk_worker_latency_samples_total{topic=\"perf-topic\",partition_index=\"1\"} 7");
    }
}
