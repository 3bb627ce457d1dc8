use const_format::formatcp;

use crate::worker::WorkerSnapshot;

use super::super::{LABEL_PARTITION_INDEX, LABEL_STAT, LABEL_TOPIC, NAMESPACE};
use super::{HEADER_HELP, HEADER_TYPE, TYPE_GAUGE};

const NAME: &str = formatcp!("{NAMESPACE}_worker_latency_milliseconds");
const HELP: &str =
    formatcp!("{HEADER_HELP} {NAME} Latency (ms) between when records were produced and when they were consumed by the worker, as min, max and average. NOTE: min and max are omitted until the worker has consumed a record.");
const TYPE: &str = formatcp!("{HEADER_TYPE} {NAME} {TYPE_GAUGE}");

pub(crate) fn append_headers(res: &mut Vec<String>) {
    res.push(HELP.into());
    res.push(TYPE.into());
}

pub(crate) fn append_metric(topic: &str, worker: &WorkerSnapshot, res: &mut Vec<String>) {
    let partition_index = worker.partition_index;
    let latency = &worker.latency;

    let stats = [("min", latency.min), ("max", latency.max), ("average", Some(latency.average))];
    for (stat, value) in stats {
        if let Some(v) = value {
            res.push(format!(
                "{NAME}\
                {{\
                    {LABEL_TOPIC}=\"{topic}\",\
                    {LABEL_PARTITION_INDEX}=\"{partition_index}\",\
                    {LABEL_STAT}=\"{stat}\"\
                }} \
                {v}"
            ));
        }
    }
}
