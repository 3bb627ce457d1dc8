use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    consumer::{BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer},
    error::KafkaError,
    types::RDKafkaErrorCode,
    ClientContext, Offset, TopicPartitionList,
};
use tokio::time::{timeout, timeout_at, Instant};

use super::client::{BrokerClient, BrokerClientFactory, PartitionCursor};
use super::errors::{BrokerError, BrokerResult};
use super::rebalance::RebalanceListener;
use crate::config::PerfConsumerConfig;
use crate::constants::MAX_POLL_RECORDS;
use crate::kafka_types::{Message, TopicPartition};

const OFFSETS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Client context of every Worker's consumer: forwards rebalance events to a [`RebalanceListener`].
///
/// The listener is only known once [`BrokerClient::subscribe`] is called,
/// hence it's set at most once after the consumer has been created.
pub struct PerfConsumerContext {
    partition_index: u32,
    listener: OnceLock<Arc<dyn RebalanceListener>>,
}

impl PerfConsumerContext {
    fn new(partition_index: u32) -> Self {
        Self {
            partition_index,
            listener: OnceLock::new(),
        }
    }
}

impl ClientContext for PerfConsumerContext {}

impl ConsumerContext for PerfConsumerContext {
    fn pre_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let (Rebalance::Revoke(tpl), Some(listener)) = (rebalance, self.listener.get()) {
            listener.on_revoked(&KafkaCursor(base_consumer), &topic_partitions(tpl));
        }
    }

    fn post_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(tpl) => {
                if let Some(listener) = self.listener.get() {
                    listener.on_assigned(&KafkaCursor(base_consumer), &topic_partitions(tpl));
                }
            },
            Rebalance::Revoke(_) => {
                // Handled in `pre_rebalance`
            },
            Rebalance::Error(e) => {
                error!("Consumer #{} failed to rebalance: {e}", self.partition_index);
            },
        }
    }
}

fn topic_partitions(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements().iter().map(TopicPartition::from).collect()
}

fn committed_position<C, K>(consumer: &K, tp: &TopicPartition) -> BrokerResult<i64>
where
    C: ConsumerContext,
    K: Consumer<C>,
{
    let mut tpl = TopicPartitionList::with_capacity(1);
    tpl.add_partition(&tp.topic, tp.partition);

    let committed = consumer.committed_offsets(tpl, OFFSETS_FETCH_TIMEOUT)?;
    match committed.find_partition(&tp.topic, tp.partition).map(|elem| elem.offset()) {
        Some(Offset::Offset(o)) => Ok(o),
        Some(_) => Err(BrokerError::NoCommittedOffset(tp.clone())),
        None => Err(BrokerError::PartitionNotAssigned(tp.clone())),
    }
}

fn seek_to<C, K>(consumer: &K, tp: &TopicPartition, offset: Offset) -> BrokerResult<()>
where
    C: ConsumerContext,
    K: Consumer<C>,
{
    consumer.seek(&tp.topic, tp.partition, offset, SEEK_TIMEOUT)?;
    Ok(())
}

/// [`PartitionCursor`] over the consumer handed to the rebalance callbacks.
struct KafkaCursor<'a, C: ConsumerContext>(&'a BaseConsumer<C>);

impl<C: ConsumerContext> PartitionCursor for KafkaCursor<'_, C> {
    fn position(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        committed_position(self.0, tp)
    }

    fn seek(&self, tp: &TopicPartition, offset: i64) -> BrokerResult<()> {
        seek_to(self.0, tp, Offset::Offset(offset))
    }

    fn seek_to_end(&self, tp: &TopicPartition) -> BrokerResult<()> {
        seek_to(self.0, tp, Offset::End)
    }
}

/// [`BrokerClient`] backed by an `rdkafka` [`StreamConsumer`].
pub struct KafkaBrokerClient {
    consumer: StreamConsumer<PerfConsumerContext>,
}

impl PartitionCursor for KafkaBrokerClient {
    fn position(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        committed_position(&self.consumer, tp)
    }

    fn seek(&self, tp: &TopicPartition, offset: i64) -> BrokerResult<()> {
        seek_to(&self.consumer, tp, Offset::Offset(offset))
    }

    fn seek_to_end(&self, tp: &TopicPartition) -> BrokerResult<()> {
        seek_to(&self.consumer, tp, Offset::End)
    }
}

#[async_trait]
impl BrokerClient for KafkaBrokerClient {
    fn subscribe(&self, topic: &str, listener: Arc<dyn RebalanceListener>) -> BrokerResult<()> {
        if self.consumer.context().listener.set(listener).is_err() {
            warn!("Rebalance listener already set: keeping the one set first");
        }

        self.consumer.subscribe(&[topic])?;
        Ok(())
    }

    async fn poll(&self, poll_timeout: Duration) -> BrokerResult<Vec<Message>> {
        let deadline = Instant::now() + poll_timeout;
        let mut batch = Vec::new();

        // Block (up to the deadline) only for the first record,
        // then collect whatever else is already available.
        match timeout_at(deadline, self.consumer.recv()).await {
            Ok(Ok(m)) => batch.push(Message::from_kafka(&m)),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(batch),
        }

        while batch.len() < MAX_POLL_RECORDS {
            match timeout(Duration::ZERO, self.consumer.recv()).await {
                Ok(Ok(m)) => batch.push(Message::from_kafka(&m)),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        Ok(batch)
    }

    fn commit_sync(&self) -> BrokerResult<()> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            // Nothing consumed since the last commit
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
            res => res.map_err(BrokerError::from),
        }
    }
}

/// Creates a [`KafkaBrokerClient`] per Worker, out of [`PerfConsumerConfig::broker`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KafkaBrokerClientFactory;

impl BrokerClientFactory for KafkaBrokerClientFactory {
    type Client = KafkaBrokerClient;

    fn connect(&self, config: &PerfConsumerConfig, partition_index: u32) -> BrokerResult<Self::Client> {
        let mut client_config = config.broker.clone();

        // Each Worker gets its own, recognisable, client identifier
        let client_id = format!(
            "{}-{partition_index}",
            client_config.get("client.id").unwrap_or(env!("CARGO_PKG_NAME"))
        );
        client_config
            .set("client.id", client_id)
            .set("enable.auto.commit", config.auto_commit.to_string());

        trace!("Consumer #{partition_index} config:\n{:#?}", client_config);

        let consumer: StreamConsumer<PerfConsumerContext> =
            client_config.create_with_context(PerfConsumerContext::new(partition_index))?;

        Ok(KafkaBrokerClient {
            consumer,
        })
    }
}
