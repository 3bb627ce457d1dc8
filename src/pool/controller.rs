use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};
use tokio::sync::{Mutex, RwLock};

use super::control::ControlCommand;
use super::scheduler::Scheduler;
use crate::broker::BrokerClientFactory;
use crate::config::PerfConsumerConfig;
use crate::kafka_types::Message;
use crate::worker::{Worker, WorkerSnapshot};

const MET_CREATED_NAME: &str = "pool_workers_created_total";
const MET_CREATED_HELP: &str = "Workers created by the pool since it started";
const MET_COMMANDS_NAME: &str = "pool_control_commands_total";
const MET_COMMANDS_HELP: &str = "Control commands received by the pool, by order";
const MET_TOTAL_NAME: &str = "pool_workers";
const MET_TOTAL_HELP: &str = "Workers registered in the pool, running or not";
const MET_RUNNING_NAME: &str = "pool_workers_running";
const MET_RUNNING_HELP: &str = "Workers of the pool currently flagged as running";
const MET_FULLY_RUNNING_NAME: &str = "pool_fully_running";
const MET_FULLY_RUNNING_HELP: &str = "1 if as many Workers are running as the pool allows, 0 otherwise";

const LABEL_ORDER: &str = "order";

type Registered = BTreeMap<u32, Arc<Worker>>;

/// Pool of [`Worker`]s, one per partition index, run by a bounded [`Scheduler`].
///
/// The pool never holds more than [`PerfConsumerConfig::max_concurrency`] Workers.
/// It only grows: [`Self::adapt_and_start`] adds Workers, nothing removes them
/// except a `START` command (which rebuilds the pool) or [`Self::shutdown`].
///
/// Reporting accessors read the Workers' statistics without synchronizing with the
/// Workers' loops: the results are approximate while consumption is in progress.
pub struct ConsumerPool<F: BrokerClientFactory> {
    config: Arc<PerfConsumerConfig>,
    factory: Arc<F>,

    // Lock order: `control`, then `scheduler`, then `workers`
    control: Mutex<()>,
    scheduler: Mutex<Scheduler>,
    workers: RwLock<Registered>,

    number_of_partitions: AtomicUsize,

    // Prometheus Metrics
    metric_created: IntCounter,
    metric_commands: IntCounterVec,
    metric_total: IntGauge,
    metric_running: IntGauge,
    metric_fully_running: IntGauge,
}

impl<F: BrokerClientFactory> ConsumerPool<F> {
    /// Create a new, empty, [`ConsumerPool`].
    ///
    /// # Arguments
    ///
    /// * `config` - Pool configuration
    /// * `factory` - Creates the broker client of each Worker
    /// * `metrics` - Registry the pool metrics are registered with
    pub fn new(config: PerfConsumerConfig, factory: F, metrics: Arc<Registry>) -> Self {
        let max_concurrency = config.max_concurrency;
        let number_of_partitions = config.initial_partition_count;

        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            control: Mutex::new(()),
            scheduler: Mutex::new(Scheduler::new(max_concurrency)),
            workers: RwLock::new(BTreeMap::new()),
            number_of_partitions: AtomicUsize::new(number_of_partitions),
            metric_created: register_int_counter_with_registry!(
                MET_CREATED_NAME,
                MET_CREATED_HELP,
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_CREATED_NAME}': {e}")),
            metric_commands: register_int_counter_vec_with_registry!(
                MET_COMMANDS_NAME,
                MET_COMMANDS_HELP,
                &[LABEL_ORDER],
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_COMMANDS_NAME}': {e}")),
            metric_total: register_int_gauge_with_registry!(MET_TOTAL_NAME, MET_TOTAL_HELP, metrics)
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_TOTAL_NAME}': {e}")),
            metric_running: register_int_gauge_with_registry!(
                MET_RUNNING_NAME,
                MET_RUNNING_HELP,
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_RUNNING_NAME}': {e}")),
            metric_fully_running: register_int_gauge_with_registry!(
                MET_FULLY_RUNNING_NAME,
                MET_FULLY_RUNNING_HELP,
                metrics
            )
            .unwrap_or_else(|e| panic!("Failed to create metric '{MET_FULLY_RUNNING_NAME}': {e}")),
        }
    }

    /// Start a Worker for every partition index in `[0, number_of_partitions)`.
    ///
    /// If the scheduler was shut down, a new one is created first.
    /// At most [`PerfConsumerConfig::max_concurrency`] Workers are started.
    /// Returns how many Workers were started.
    pub async fn prepare_and_start_consumers(&self) -> usize {
        let max = self.config.max_concurrency;

        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_shutdown() {
            *scheduler = Scheduler::new(max);
        }
        let mut workers = self.workers.write().await;

        let requested = self.number_of_partitions();
        let count = if requested > max {
            warn!("Requested {requested} consumers, but at most {max} are allowed: starting {max}");
            max
        } else {
            requested
        };

        let mut started = 0;
        for idx in 0..count as u32 {
            if workers.contains_key(&idx) {
                continue;
            }
            if !self.start_worker(idx, &mut workers, &mut scheduler) {
                break;
            }
            started += 1;
        }
        self.number_of_partitions.store(count, Ordering::Relaxed);

        info!("Started {started} consumers ({} registered, max {max})", workers.len());
        started
    }

    /// Grow the pool to `new_count` Workers, clamped to [`PerfConsumerConfig::max_concurrency`].
    ///
    /// Only the partition indexes in `[number_of_partitions, new_count)` get a new Worker:
    /// if `new_count` is not greater than the current number of partitions, nothing happens.
    /// The pool is never shrunk.
    /// Returns how many Workers were started.
    pub async fn adapt_and_start(&self, new_count: usize) -> usize {
        let max = self.config.max_concurrency;
        let target = if new_count > max {
            warn!("Requested {new_count} consumers, but at most {max} are allowed: adapting to {max}");
            max
        } else {
            new_count
        };

        let mut scheduler = self.scheduler.lock().await;
        let mut workers = self.workers.write().await;

        let current = self.number_of_partitions();
        if target <= current {
            debug!("Pool already sized for {current} partitions: not adapting to {target}");
            return 0;
        }

        let mut started = 0;
        let mut reached = current;
        for idx in current..target {
            if !workers.contains_key(&(idx as u32)) {
                if !self.start_worker(idx as u32, &mut workers, &mut scheduler) {
                    break;
                }
                started += 1;
            }
            reached = idx + 1;
        }
        self.number_of_partitions.store(reached, Ordering::Relaxed);

        info!("Adapted pool from {current} to {reached} partitions: started {started} consumers");
        started
    }

    /// Apply a [`ControlCommand`]; returns `true` if the command was recognized.
    ///
    /// Commands are applied one at a time. Failures while applying a recognized command
    /// do not change the outcome: they are logged, and visible through
    /// [`Self::number_of_running_consumers`] and [`Self::is_fully_running`].
    pub async fn control_consumers(&self, cmd: &ControlCommand) -> bool {
        let _guard = self.control.lock().await;

        info!("Received control command {cmd}");
        self.metric_commands.with_label_values(&[cmd.order_label()]).inc();

        match cmd {
            ControlCommand::Stop => {
                for w in self.workers.read().await.values() {
                    w.stop();
                }
                self.stop_consumers().await;
                true
            },
            ControlCommand::Start => {
                self.stop_consumers().await;
                self.workers.write().await.clear();
                self.prepare_and_start_consumers().await;
                true
            },
            ControlCommand::Update(n) => {
                self.adapt_and_start(*n).await;
                true
            },
            ControlCommand::Unrecognized(order) => {
                warn!("Unrecognized control order {order:?}: ignoring");
                false
            },
        }
    }

    /// Shut down the scheduler, wait for its tasks to terminate, then stop every Worker still running.
    ///
    /// Waiting is bounded by [`PerfConsumerConfig::termination_grace_period`]: Workers that
    /// outlive it are aborted. Either way, every Worker is stopped once this returns.
    pub async fn stop_consumers(&self) {
        let grace_period = self.config.termination_grace_period;

        {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.shutdown_now();
            if !scheduler.await_termination(grace_period).await {
                warn!("Consumers did not terminate within {grace_period:?}: forcing them to stop");
            }
        }

        for w in self.workers.read().await.values() {
            if w.is_running() {
                w.stop();
            }
        }
    }

    /// Tear down the pool: stop every Worker, then discard them.
    pub async fn shutdown(&self) {
        let _guard = self.control.lock().await;

        self.stop_consumers().await;
        let discarded = {
            let mut workers = self.workers.write().await;
            let n = workers.len();
            workers.clear();
            n
        };

        info!("Pool shut down: discarded {discarded} consumers");
    }

    /// Drain the messages buffered by every Worker into a single list.
    pub async fn get_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.config.max_buffered_messages);
        for w in self.workers.read().await.values() {
            messages.extend(w.drain_messages().await);
        }
        messages
    }

    /// Sum of the average latency of each Worker.
    ///
    /// NOTE: This is not weighted by the number of samples of each Worker,
    /// so it's not the average latency across all consumed records.
    pub async fn cross_consumer_average_latency(&self) -> i64 {
        self.workers.read().await.values().map(|w| w.latency().average()).sum()
    }

    /// Highest latency observed by any Worker, if any Worker has observed one.
    pub async fn cross_consumer_max_latency(&self) -> Option<i64> {
        self.workers.read().await.values().filter_map(|w| w.latency().max()).max()
    }

    /// Lowest latency observed by any Worker, if any Worker has observed one.
    pub async fn cross_consumer_min_latency(&self) -> Option<i64> {
        self.workers.read().await.values().filter_map(|w| w.latency().min()).min()
    }

    pub async fn number_of_consumers(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn number_of_running_consumers(&self) -> usize {
        self.workers.read().await.values().filter(|w| w.is_running()).count()
    }

    /// `true` if as many Workers are running as [`PerfConsumerConfig::max_concurrency`].
    pub async fn is_fully_running(&self) -> bool {
        self.number_of_running_consumers().await == self.config.max_concurrency
    }

    pub fn max_consumers(&self) -> usize {
        self.config.max_concurrency
    }

    pub fn number_of_partitions(&self) -> usize {
        self.number_of_partitions.load(Ordering::Relaxed)
    }

    pub fn set_number_of_partitions(&self, number_of_partitions: usize) {
        self.number_of_partitions.store(number_of_partitions, Ordering::Relaxed);
    }

    /// Registered Workers, ordered by partition index.
    pub async fn workers(&self) -> Vec<Arc<Worker>> {
        self.workers.read().await.values().cloned().collect()
    }

    pub async fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        let mut snapshots = Vec::new();
        for w in self.workers().await {
            snapshots.push(w.snapshot().await);
        }
        snapshots
    }

    /// Bring the pool gauges up to date: meant to be called right before metrics are gathered.
    pub async fn update_metrics(&self) {
        let total = self.number_of_consumers().await;
        let running = self.number_of_running_consumers().await;

        self.metric_total.set(total as i64);
        self.metric_running.set(running as i64);
        self.metric_fully_running.set((running == self.config.max_concurrency) as i64);
    }

    fn start_worker(&self, partition_index: u32, workers: &mut Registered, scheduler: &mut Scheduler) -> bool {
        if workers.len() >= self.config.max_concurrency {
            warn!(
                "Pool already has {} consumers: not starting consumer #{partition_index}",
                workers.len()
            );
            return false;
        }

        let worker = Arc::new(Worker::new(partition_index, self.config.max_buffered_messages));

        let w = worker.clone();
        let factory = self.factory.clone();
        let config = self.config.clone();
        let res = scheduler.submit(move |shutdown_token| async move {
            match factory.connect(&config, partition_index) {
                Ok(client) => w.run(client, &config, shutdown_token).await,
                Err(e) => {
                    error!("Consumer #{partition_index} failed to connect: {e}");
                    w.stop();
                },
            }
        });

        match res {
            Ok(()) => {
                workers.insert(partition_index, worker);
                self.metric_created.inc();
                true
            },
            Err(e) => {
                error!("Unable to schedule consumer #{partition_index}: {e}");
                false
            },
        }
    }
}
