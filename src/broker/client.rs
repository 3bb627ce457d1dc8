use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::errors::BrokerResult;
use super::rebalance::RebalanceListener;
use crate::config::PerfConsumerConfig;
use crate::kafka_types::{Message, TopicPartition};

/// Offset introspection and repositioning for the partitions assigned to a client.
///
/// This is what a [`RebalanceListener`] is given to work with when partitions change hands,
/// from inside the client's own rebalance callback.
pub trait PartitionCursor {
    /// Committed position of the given partition: where consumption resumes from.
    fn position(&self, tp: &TopicPartition) -> BrokerResult<i64>;

    /// Move the fetch position of the given partition to `offset`.
    fn seek(&self, tp: &TopicPartition, offset: i64) -> BrokerResult<()>;

    /// Move the fetch position of the given partition to its end (latest offset).
    fn seek_to_end(&self, tp: &TopicPartition) -> BrokerResult<()>;
}

/// Connection to the broker, as used by a single [`crate::worker::Worker`].
#[async_trait]
pub trait BrokerClient: PartitionCursor + Send + Sync {
    /// Subscribe to `topic`; `listener` is invoked on every partition (re)assignment and revocation.
    fn subscribe(&self, topic: &str, listener: Arc<dyn RebalanceListener>) -> BrokerResult<()>;

    /// Wait up to `timeout` for a batch of records.
    ///
    /// An empty batch means that nothing was available before the timeout elapsed.
    async fn poll(&self, timeout: Duration) -> BrokerResult<Vec<Message>>;

    /// Commit, synchronously, the offsets of everything consumed so far.
    fn commit_sync(&self) -> BrokerResult<()>;
}

/// Creates [`BrokerClient`]s: one per [`crate::worker::Worker`].
pub trait BrokerClientFactory: Send + Sync + 'static {
    type Client: BrokerClient + 'static;

    /// Open a new connection to the broker.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration of the pool, including the broker connection properties
    /// * `partition_index` - Index of the Worker the client is for
    fn connect(&self, config: &PerfConsumerConfig, partition_index: u32) -> BrokerResult<Self::Client>;
}
