// Inner modules
mod client;
mod errors;
mod kafka;
mod rebalance;

#[cfg(test)]
pub(crate) mod testing;

// Exports
pub use client::{BrokerClient, BrokerClientFactory};
pub use kafka::KafkaBrokerClientFactory;
pub use rebalance::SeekRoundTripListener;
