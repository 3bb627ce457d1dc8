use std::time::Duration;

use rdkafka::ClientConfig;

/// Read-only configuration consumed by the [`crate::pool::ConsumerPool`] and its Workers.
///
/// It is built once at startup (see [`crate::cli::Cli::build_perf_consumer_config`])
/// and shared behind an `Arc`: nothing downstream mutates it.
#[derive(Debug, Clone)]
pub struct PerfConsumerConfig {
    /// Topic every Worker subscribes to
    pub topic: String,

    /// Max time a Worker blocks waiting for a batch of records
    pub poll_timeout: Duration,

    /// When `false`, Workers commit synchronously once per poll cycle
    pub auto_commit: bool,

    /// Hard ceiling on the number of Workers (and scheduler slots)
    pub max_concurrency: usize,

    /// How many consumed messages each Worker keeps for inspection
    pub max_buffered_messages: usize,

    /// Number of Workers created when the pool is (re)started
    pub initial_partition_count: usize,

    /// How long to wait for Workers to terminate, before forcing them to stop
    pub termination_grace_period: Duration,

    /// Broker connection properties, handed as-is to each Worker's client
    pub broker: ClientConfig,
}

#[cfg(test)]
impl PerfConsumerConfig {
    /// Configuration suitable for tests: short timeouts, no broker properties.
    pub(crate) fn for_tests(max_concurrency: usize, initial_partition_count: usize) -> Self {
        Self {
            topic: "perf-topic".to_string(),
            poll_timeout: Duration::from_millis(20),
            auto_commit: true,
            max_concurrency,
            max_buffered_messages: 10,
            initial_partition_count,
            termination_grace_period: Duration::from_secs(2),
            broker: ClientConfig::new(),
        }
    }
}
