use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::buffer::MessageBuffer;
use super::latency::{LatencySnapshot, LatencyStats};
use crate::broker::{BrokerClient, SeekRoundTripListener};
use crate::config::PerfConsumerConfig;
use crate::kafka_types::Message;

/// Lifecycle of a [`Worker`]: `Init → Running ⇄ Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Init = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Init,
            1 => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }
}

/// Point-in-time view of a [`Worker`], for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    pub partition_index: u32,
    pub state: WorkerState,
    pub latency: LatencySnapshot,
    pub buffered_messages: usize,
}

/// Consumes one partition slot of the pool, measuring the latency of every record it receives.
///
/// A Worker is created (and registered) by the [`crate::pool::ConsumerPool`], and then
/// [`Self::run`] inside a scheduler task. It mutates only its own state: statistics
/// and buffered messages are never written by anything else.
///
/// The running flag is cooperative: it's checked between poll cycles, so a [`Self::stop`]
/// takes effect within one poll timeout. A stopped Worker can be flagged as running again
/// with [`Self::restart`].
pub struct Worker {
    partition_index: u32,
    state: AtomicU8,
    latency: LatencyStats,
    messages: MessageBuffer,
}

impl Worker {
    pub fn new(partition_index: u32, max_buffered_messages: usize) -> Self {
        Self {
            partition_index,
            state: AtomicU8::new(WorkerState::Init as u8),
            latency: LatencyStats::new(),
            messages: MessageBuffer::new(max_buffered_messages),
        }
    }

    pub fn partition_index(&self) -> u32 {
        self.partition_index
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::Relaxed))
    }

    /// A Worker counts as running from its creation, until it's stopped.
    pub fn is_running(&self) -> bool {
        self.state() != WorkerState::Stopped
    }

    pub fn stop(&self) {
        if self.state.swap(WorkerState::Stopped as u8, Ordering::Relaxed) != WorkerState::Stopped as u8 {
            info!("Stop consumer #{}", self.partition_index);
        }
    }

    pub fn restart(&self) {
        info!("Restart consumer #{}", self.partition_index);
        self.state.store(WorkerState::Running as u8, Ordering::Relaxed);
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    /// Remove and return the messages buffered so far.
    pub async fn drain_messages(&self) -> Vec<Message> {
        self.messages.drain().await
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            partition_index: self.partition_index,
            state: self.state(),
            latency: self.latency.snapshot(),
            buffered_messages: self.messages.len().await,
        }
    }

    /// Consumption loop.
    ///
    /// Subscribes once, then polls until the Worker is stopped or `shutdown_token` is cancelled.
    /// Any error from the broker is fatal: it's logged and the Worker is stopped.
    ///
    /// # Arguments
    ///
    /// * `client` - Connection to the broker, owned by this loop
    /// * `config` - Pool configuration: topic, poll timeout and auto-commit
    /// * `shutdown_token` - When cancelled, interrupts an in-flight poll and terminates the loop
    pub async fn run<B: BrokerClient>(
        &self,
        client: B,
        config: &PerfConsumerConfig,
        shutdown_token: CancellationToken,
    ) {
        info!("Start consumer #{} on topic '{}'", self.partition_index, config.topic);

        if let Err(e) = client.subscribe(&config.topic, Arc::new(SeekRoundTripListener)) {
            error!("Consumer #{} failed to subscribe to '{}': {e}", self.partition_index, config.topic);
            self.stop();
            return;
        }

        // Do not override a stop that happened while subscribing
        if self
            .state
            .compare_exchange(
                WorkerState::Init as u8,
                WorkerState::Running as u8,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_err()
        {
            debug!("Consumer #{} stopped before it started polling", self.partition_index);
        }

        while self.is_running() {
            let res_batch = tokio::select! {
                res = client.poll(config.poll_timeout) => res,
                _ = shutdown_token.cancelled() => {
                    info!("Consumer #{} interrupted while polling", self.partition_index);
                    break;
                },
            };

            match res_batch {
                Ok(batch) => self.process(batch).await,
                Err(e) => {
                    error!("Consumer #{} loop has been unexpectedly interrupted: {e}", self.partition_index);
                    self.stop();
                    break;
                },
            }

            if !config.auto_commit {
                trace!("Consumer #{} committing", self.partition_index);
                if let Err(e) = client.commit_sync() {
                    error!("Consumer #{} failed to commit: {e}", self.partition_index);
                    self.stop();
                    break;
                }
            }
        }

        info!("Consumer #{} loop terminated", self.partition_index);
    }

    async fn process(&self, batch: Vec<Message>) {
        for m in batch.iter() {
            self.record(m, Utc::now().timestamp_millis());
        }
        self.messages.extend(batch).await;
    }

    fn record(&self, m: &Message, now_ms: i64) {
        trace!(
            "Consumer #{} record - key: {:?} timestamp: {:?} value: {:?} partition: {} offset: {}",
            self.partition_index,
            m.key,
            m.produced_timestamp,
            m.value,
            m.partition,
            m.offset
        );

        match m.latency_ms(now_ms) {
            Some(latency) => self.latency.observe(latency),
            None => debug!(
                "Consumer #{} record at offset {} of partition {} has no timestamp: not sampled",
                self.partition_index, m.offset, m.partition
            ),
        }
    }
}
