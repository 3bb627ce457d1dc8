use log::Level;

use super::client::PartitionCursor;
use super::errors::{BrokerError, BrokerResult};
use crate::kafka_types::TopicPartition;

/// Reacts to partitions being assigned to, or revoked from, a [`super::BrokerClient`].
///
/// Both callbacks run inside the client's rebalance handling: they must not block for long,
/// and must not fail. Whatever goes wrong is theirs to log.
pub trait RebalanceListener: Send + Sync {
    /// Called after `partitions` have been assigned to the client.
    fn on_assigned(&self, cursor: &dyn PartitionCursor, partitions: &[TopicPartition]);

    /// Called before `partitions` are revoked from the client.
    fn on_revoked(&self, cursor: &dyn PartitionCursor, partitions: &[TopicPartition]);
}

/// Makes the starting offset of every newly assigned partition explicit.
///
/// For each assigned partition it reads the committed position, seeks to the end
/// and then back to that position. The cursor does not move overall, but the consumer
/// will not fall back to `auto.offset.reset` and replay a large backlog from "earliest".
///
/// Revocation is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeekRoundTripListener;

impl SeekRoundTripListener {
    fn round_trip(cursor: &dyn PartitionCursor, tp: &TopicPartition) -> BrokerResult<i64> {
        let position = cursor.position(tp)?;
        info!("Partition '{tp}' current position: {position}");

        debug!("Partition '{tp}' seeking to end...");
        cursor.seek_to_end(tp)?;

        cursor.seek(tp, position)?;
        Ok(position)
    }

    /// A partition without a committed offset is expected for a brand new consumer group.
    fn log_level(e: &BrokerError) -> Level {
        match e {
            BrokerError::NoCommittedOffset(_) => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl RebalanceListener for SeekRoundTripListener {
    fn on_assigned(&self, cursor: &dyn PartitionCursor, partitions: &[TopicPartition]) {
        warn!("Partitions {:?} assigned, consumer seeking to end and back", partitions);

        for tp in partitions {
            match Self::round_trip(cursor, tp) {
                Ok(position) => debug!("Partition '{tp}' will be consumed from {position}"),
                Err(e) => log!(Self::log_level(&e), "Error when assigning partition '{tp}': {e}"),
            }
        }

        warn!("Producers can now begin producing messages");
    }

    fn on_revoked(&self, _cursor: &dyn PartitionCursor, partitions: &[TopicPartition]) {
        debug!("Partitions {:?} revoked", partitions);
    }
}
