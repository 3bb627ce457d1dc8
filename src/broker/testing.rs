//! In-memory stand-ins for the broker, so that Workers and the Pool can be tested without Kafka.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;

use super::client::{BrokerClient, BrokerClientFactory, PartitionCursor};
use super::errors::{BrokerError, BrokerResult};
use super::rebalance::RebalanceListener;
use crate::config::PerfConsumerConfig;
use crate::kafka_types::{Message, TopicPartition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorCall {
    Position(TopicPartition),
    SeekToEnd(TopicPartition),
    Seek(TopicPartition, i64),
}

/// [`PartitionCursor`] that records every call made to it.
///
/// Partitions without a known position fail [`PartitionCursor::position`].
#[derive(Default)]
pub struct RecordingCursor {
    positions: HashMap<TopicPartition, i64>,
    calls: Mutex<Vec<CursorCall>>,
}

impl RecordingCursor {
    pub fn with_positions(positions: &[(TopicPartition, i64)]) -> Self {
        Self {
            positions: positions.iter().cloned().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CursorCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl PartitionCursor for RecordingCursor {
    fn position(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        self.calls.lock().unwrap().push(CursorCall::Position(tp.clone()));
        self.positions.get(tp).copied().ok_or_else(|| BrokerError::NoCommittedOffset(tp.clone()))
    }

    fn seek(&self, tp: &TopicPartition, offset: i64) -> BrokerResult<()> {
        self.calls.lock().unwrap().push(CursorCall::Seek(tp.clone(), offset));
        Ok(())
    }

    fn seek_to_end(&self, tp: &TopicPartition) -> BrokerResult<()> {
        self.calls.lock().unwrap().push(CursorCall::SeekToEnd(tp.clone()));
        Ok(())
    }
}

/// Scripted broker shared by every [`FakeClient`] a [`FakeBrokerFactory`] creates.
///
/// Client `N` is assigned partition `N` of the topic as soon as it subscribes: the rebalance
/// listener then runs against a shared [`RecordingCursor`].
#[derive(Default)]
pub struct FakeBroker {
    batches: Mutex<VecDeque<Vec<Message>>>,
    cursor: RecordingCursor,
    fail_polls: AtomicBool,
    fail_commits: AtomicBool,
    fail_connects: AtomicBool,
    connects: AtomicUsize,
    subscribes: AtomicUsize,
    polls: AtomicUsize,
    commits: AtomicUsize,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Broker where the given partitions have a committed position.
    pub fn with_positions(positions: &[(TopicPartition, i64)]) -> Arc<Self> {
        Arc::new(Self {
            cursor: RecordingCursor::with_positions(positions),
            ..Default::default()
        })
    }

    /// Queue a batch: the next poll (by any client) returns it.
    pub fn push_batch(&self, batch: Vec<Message>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// From now on, every poll fails.
    pub fn fail_polls(&self) {
        self.fail_polls.store(true, Ordering::SeqCst);
    }

    /// From now on, every commit fails.
    pub fn fail_commits(&self) {
        self.fail_commits.store(true, Ordering::SeqCst);
    }

    /// From now on, every connection attempt fails.
    pub fn fail_connects(&self) {
        self.fail_connects.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Cursor calls made by the rebalance listeners of every client, in order.
    pub fn cursor_calls(&self) -> Vec<CursorCall> {
        self.cursor.calls()
    }
}

pub struct FakeClient {
    broker: Arc<FakeBroker>,
    partition_index: u32,
}

impl PartitionCursor for FakeClient {
    fn position(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        self.broker.cursor.position(tp)
    }

    fn seek(&self, tp: &TopicPartition, offset: i64) -> BrokerResult<()> {
        self.broker.cursor.seek(tp, offset)
    }

    fn seek_to_end(&self, tp: &TopicPartition) -> BrokerResult<()> {
        self.broker.cursor.seek_to_end(tp)
    }
}

#[async_trait]
impl BrokerClient for FakeClient {
    fn subscribe(&self, topic: &str, listener: Arc<dyn RebalanceListener>) -> BrokerResult<()> {
        self.broker.subscribes.fetch_add(1, Ordering::SeqCst);

        let assigned = TopicPartition::new(topic, self.partition_index as i32);
        listener.on_assigned(self, &[assigned]);
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> BrokerResult<Vec<Message>> {
        self.broker.polls.fetch_add(1, Ordering::SeqCst);

        if self.broker.fail_polls.load(Ordering::SeqCst) {
            return Err(KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure).into());
        }

        let next = self.broker.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            },
        }
    }

    fn commit_sync(&self) -> BrokerResult<()> {
        self.broker.commits.fetch_add(1, Ordering::SeqCst);

        if self.broker.fail_commits.load(Ordering::SeqCst) {
            return Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::RebalanceInProgress).into());
        }
        Ok(())
    }
}

pub struct FakeBrokerFactory {
    pub broker: Arc<FakeBroker>,
}

impl FakeBrokerFactory {
    pub fn new(broker: Arc<FakeBroker>) -> Self {
        Self {
            broker,
        }
    }
}

impl BrokerClientFactory for FakeBrokerFactory {
    type Client = FakeClient;

    fn connect(&self, _config: &PerfConsumerConfig, partition_index: u32) -> BrokerResult<Self::Client> {
        self.broker.connects.fetch_add(1, Ordering::SeqCst);

        if self.broker.fail_connects.load(Ordering::SeqCst) {
            return Err(KafkaError::ClientCreation("broker unreachable".to_string()).into());
        }

        Ok(FakeClient {
            broker: self.broker.clone(),
            partition_index,
        })
    }
}

/// Polls `condition` until it holds, giving up after a few seconds.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
