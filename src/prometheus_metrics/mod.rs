pub mod bespoke;

use std::collections::HashMap;

use prometheus::Registry;

pub const NAMESPACE: &str = "pfk";

pub const LABEL_TOPIC: &str = "topic";
pub const LABEL_PARTITION_INDEX: &str = "partition_index";
pub const LABEL_STAT: &str = "stat";

pub fn init(topic: &str) -> Registry {
    let prom_def_labels = HashMap::from([(LABEL_TOPIC.to_string(), topic.to_string())]);

    info!("Prometheus Metrics default labels:\n{:#?}", prom_def_labels);

    Registry::new_custom(Some(NAMESPACE.to_string()), Some(prom_def_labels))
        .expect("Unable to create a Prometheus Metrics Registry")
}
