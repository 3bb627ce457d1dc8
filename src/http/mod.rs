use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use prometheus::{Registry, TextEncoder};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use crate::broker::KafkaBrokerClientFactory;
use crate::pool::{ConsumerPool, ControlCommand, ControlRequest};
use crate::prometheus_metrics::bespoke::*;
use crate::worker::WorkerSnapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type Pool = ConsumerPool<KafkaBrokerClientFactory>;

#[derive(Clone)]
struct HttpServiceState {
    topic: Arc<str>,
    pool: Arc<Pool>,
    metrics: Arc<Registry>,
}

/// Status of the pool, as returned by `GET /consumers`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolStatus {
    number_of_consumers: usize,
    number_of_running_consumers: usize,
    is_fully_running: bool,
    number_of_partitions: usize,
    max_consumers: usize,
    average_latency_cross_consumers: i64,
    max_latency_cross_consumers: Option<i64>,
    min_latency_cross_consumers: Option<i64>,
    consumers: Vec<WorkerSnapshot>,
}

pub async fn init(
    listen_on: SocketAddr,
    topic: &str,
    pool: Arc<Pool>,
    shutdown_token: CancellationToken,
    metrics: Arc<Registry>,
) -> std::io::Result<()> {
    // Assemble the HTTP Service State object, that will be passed to the routes
    let state = HttpServiceState {
        topic: Arc::from(topic),
        pool,
        metrics,
    };

    // Setup Router
    let app = Router::new()
        .route("/", get(root))
        .route("/control", post(control))
        .route("/consumers", get(consumers))
        .route("/consumers/partitions/:number_of_partitions", put(set_partitions))
        .route("/messages", get(messages))
        .route("/metrics", get(prometheus_metrics))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state);

    // Setup Server, with Graceful Shutdown
    let listener = TcpListener::bind(listen_on).await?;

    info!("Begin listening on '{}'...", listen_on);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await
}

async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

async fn control(
    State(state): State<HttpServiceState>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<bool>, StatusCode> {
    let cmd = ControlCommand::from(req);

    // Detached from the request: a command must run to completion, even if the client goes away
    let pool = state.pool.clone();
    tokio::spawn(async move { pool.control_consumers(&cmd).await }).await.map(Json).map_err(|e| {
        error!("Control command task failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn consumers(State(state): State<HttpServiceState>) -> Json<PoolStatus> {
    let pool = &state.pool;

    Json(PoolStatus {
        number_of_consumers: pool.number_of_consumers().await,
        number_of_running_consumers: pool.number_of_running_consumers().await,
        is_fully_running: pool.is_fully_running().await,
        number_of_partitions: pool.number_of_partitions(),
        max_consumers: pool.max_consumers(),
        average_latency_cross_consumers: pool.cross_consumer_average_latency().await,
        max_latency_cross_consumers: pool.cross_consumer_max_latency().await,
        min_latency_cross_consumers: pool.cross_consumer_min_latency().await,
        consumers: pool.worker_snapshots().await,
    })
}

async fn set_partitions(
    State(state): State<HttpServiceState>,
    Path(number_of_partitions): Path<usize>,
) -> Json<usize> {
    state.pool.set_number_of_partitions(number_of_partitions);
    Json(state.pool.number_of_partitions())
}

async fn messages(State(state): State<HttpServiceState>) -> impl IntoResponse {
    Json(state.pool.get_messages().await)
}

async fn prometheus_metrics(State(state): State<HttpServiceState>) -> impl IntoResponse {
    let mut status = StatusCode::OK;
    let mut headers = HeaderMap::new();

    // As defined by Prometheus: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#basic-info
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));

    // Procure the Workers once and reuse them in all metrics that need them
    let workers = state.pool.worker_snapshots().await;
    state.pool.update_metrics().await;

    // Allocate a Vector of Strings to build the body of the output.
    // The capacity is a function of the number of metric types produced, and the number of workers.
    let metric_types_count: usize = 2;
    let headers_count: usize = metric_types_count * 2;
    let lines_per_worker: usize = 4;
    let mut body: Vec<String> = Vec::with_capacity(workers.len() * lines_per_worker + headers_count);

    // ------------------------------------------------- METRIC: worker_latency_milliseconds
    worker_latency_milliseconds::append_headers(&mut body);
    iter_workers(&workers, &mut body, &state.topic, worker_latency_milliseconds::append_metric);

    // ------------------------------------------------- METRIC: worker_latency_samples_total
    worker_latency_samples::append_headers(&mut body);
    iter_workers(&workers, &mut body, &state.topic, worker_latency_samples::append_metric);

    // Turn the bespoke metrics created so far, into a String
    let mut body = body.join("\n");
    body.push('\n');

    // Append to the bespoke metrics, classic Prometheus Metrics
    let metrics_family = state.metrics.gather();
    if let Err(e) = TextEncoder.encode_utf8(&metrics_family, &mut body) {
        status = StatusCode::INTERNAL_SERVER_ERROR;
        body = format!("Failed to encode metrics: {e}");
    }

    (status, headers, body)
}
