use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::kafka_types::TopicPartition;

/// Possible errors from the [`super`] module.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Error reported by the Kafka client.
    #[error("Kafka client error: {0}")]
    Kafka(#[from] KafkaError),

    /// The Topic Partition has no committed offset the consumer could resume from.
    #[error("No committed offset for '{0}'")]
    NoCommittedOffset(TopicPartition),

    /// The Topic Partition is not currently assigned to this client.
    #[error("Partition '{0}' is not assigned to this client")]
    PartitionNotAssigned(TopicPartition),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
