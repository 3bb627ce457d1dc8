#[macro_use]
extern crate log;

mod broker;
mod cli;
mod config;
mod constants;
mod http;
mod kafka_types;
mod logging;
mod pool;
mod prometheus_metrics;
mod worker;

use std::error::Error;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use broker::KafkaBrokerClientFactory;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = parse_cli_and_init_logging();
    let config = cli.build_perf_consumer_config();

    let shutdown_token = build_shutdown_token();

    // Init `prometheus_metrics`
    let metrics = Arc::new(prometheus_metrics::init(&config.topic));

    // Init `pool`: creates the consumers for the initial number of partitions
    let topic = config.topic.clone();
    let pool = Arc::new(pool::init(config, KafkaBrokerClientFactory, metrics.clone()).await);

    // Init `http`: runs until shutdown is requested
    if let Err(e) = http::init(cli.listen_on(), &topic, pool.clone(), shutdown_token.clone(), metrics).await {
        error!("Failed to serve HTTP on '{}': {e}", cli.listen_on());
        pool.shutdown().await;
        std::process::exit(exit_code::SERVICE_UNAVAILABLE);
    }

    // Tear down every consumer still running
    pool.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

fn parse_cli_and_init_logging() -> Cli {
    // Parse command line input and initialize logging
    let cli = Cli::parse_and_validate();
    logging::init(cli.verbosity_level());

    trace!("Created:\n{:#?}", cli);

    cli
}

fn build_shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();

    // Setup shutdown signal handler:
    // when it's time to shutdown, cancel the token shared with the rest of the system.
    //
    // NOTE: This handler will be listening on its own dedicated thread.
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutting down...");
        handler_token.cancel();
    }) {
        error!("Failed to register signal handler: {e}");
    }

    token
}
