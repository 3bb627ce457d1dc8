// Inner modules
mod control;
mod controller;
mod scheduler;

use std::sync::Arc;

use prometheus::Registry;

use crate::broker::BrokerClientFactory;
use crate::config::PerfConsumerConfig;

// Exports
pub use control::{ControlCommand, ControlRequest};
pub use controller::ConsumerPool;

/// Create the [`ConsumerPool`] and start its initial Workers.
pub async fn init<F: BrokerClientFactory>(
    config: PerfConsumerConfig,
    factory: F,
    metrics: Arc<Registry>,
) -> ConsumerPool<F> {
    let pool = ConsumerPool::new(config, factory, metrics);
    pool.prepare_and_start_consumers().await;

    debug!("Initialized");
    pool
}
