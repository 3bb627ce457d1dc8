use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{ArgGroup, Parser};
use rdkafka::ClientConfig;

use crate::config::PerfConsumerConfig;
use crate::constants::{
    DEFAULT_GROUP_ID, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_MAX_CONSUMERS, DEFAULT_MAX_MESSAGES,
    DEFAULT_PARTITIONS, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_TERMINATION_TIMEOUT_SECS,
};

/// Command Line Interface, defined via the declarative,
/// `derive` based functionality of the `clap` crate.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("logging_flags")
        .required(false)
        .multiple(false)
        .args(["verbose", "quiet"]),
))]
pub struct Cli {
    // ------------------------------------------------------------------------ Consumer configuration
    /// Initial Kafka Brokers to connect to (format: 'HOST:PORT,...').
    ///
    /// Equivalent to '--kafka-conf=bootstrap.servers:host:port,...'.
    #[arg(short, long = "brokers", value_name = "BOOTSTRAP_BROKERS", env = "PERF_KONSUMER_BROKERS")]
    pub bootstrap_brokers: String,

    /// Topic the consumers subscribe to.
    #[arg(short, long, value_name = "TOPIC", env = "PERF_KONSUMER_TOPIC")]
    pub topic: String,

    /// Consumer Group all the consumers are members of.
    ///
    /// Equivalent to '--kafka-conf=group.id:my-group-id'.
    #[arg(long = "group-id", value_name = "GROUP_ID", default_value = DEFAULT_GROUP_ID, env = "PERF_KONSUMER_GROUP_ID")]
    pub group_id: String,

    /// Client identifier used by the consumers: each appends its own partition index to it.
    ///
    /// Equivalent to '--kafka-conf=client.id:my-client-id'.
    #[arg(long = "client-id", value_name = "CLIENT_ID", default_value = env!("CARGO_PKG_NAME"), env = "PERF_KONSUMER_CLIENT_ID")]
    pub client_id: String,

    /// Additional configuration used by the internal Kafka Consumers (format: 'CONF_KEY:CONF_VAL').
    ///
    /// To set multiple configurations keys, use this argument multiple times.
    /// See: https://github.com/edenhill/librdkafka/blob/master/CONFIGURATION.md.
    #[arg(
        long = "kafka-conf",
        value_name = "CONF_KEY:CONF_VAL",
        value_parser = kv_clap_value_parser,
        verbatim_doc_comment
    )]
    pub kafka_config: Vec<KVPair>,

    /// Max time (ms) a consumer waits for records, on each poll.
    ///
    /// This also bounds how long it takes for a consumer to notice it has been stopped.
    #[arg(
        long = "poll-timeout-ms",
        value_name = "MILLISECONDS",
        default_value = DEFAULT_POLL_TIMEOUT_MS,
        env = "PERF_KONSUMER_POLL_TIMEOUT_MS"
    )]
    pub poll_timeout_ms: u64,

    /// Let the Kafka client commit offsets automatically.
    ///
    /// When disabled, each consumer commits synchronously after every poll.
    #[arg(long = "auto-commit", env = "PERF_KONSUMER_AUTO_COMMIT")]
    pub auto_commit: bool,

    // ---------------------------------------------------------------------------- Pool configuration
    /// Max number of consumers the pool can run.
    #[arg(
        long = "max-consumers",
        value_name = "COUNT",
        default_value = DEFAULT_MAX_CONSUMERS,
        value_parser = clap::value_parser!(u32).range(1..),
        env = "PERF_KONSUMER_MAX_CONSUMERS"
    )]
    pub max_consumers: u32,

    /// Number of consumed messages each consumer keeps, for inspection via 'GET /messages'.
    #[arg(
        long = "max-messages",
        value_name = "COUNT",
        default_value = DEFAULT_MAX_MESSAGES,
        env = "PERF_KONSUMER_MAX_MESSAGES"
    )]
    pub max_messages: usize,

    /// Number of consumers started with the pool: ideally, the number of partitions of '--topic'.
    #[arg(
        short,
        long = "partitions",
        value_name = "COUNT",
        default_value = DEFAULT_PARTITIONS,
        env = "PERF_KONSUMER_PARTITIONS"
    )]
    pub partitions: usize,

    /// How long (seconds) to wait for consumers to terminate, before forcing them to stop.
    #[arg(
        long = "termination-timeout-secs",
        value_name = "SECONDS",
        default_value = DEFAULT_TERMINATION_TIMEOUT_SECS,
        env = "PERF_KONSUMER_TERMINATION_TIMEOUT_SECS"
    )]
    pub termination_timeout_secs: u64,

    // ---------------------------------------------------------------------------- HTTP configuration
    /// Host address to listen on for HTTP requests.
    ///
    /// Supports both IPv4 and IPv6 addresses.
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "PERF_KONSUMER_HOST", verbatim_doc_comment)]
    pub host: IpAddr,

    /// Port to listen on for HTTP requests.
    #[arg(long, default_value = DEFAULT_HTTP_PORT, env = "PERF_KONSUMER_PORT", verbatim_doc_comment)]
    pub port: u16,

    /// Verbose logging.
    ///
    /// * none    = 'WARN'
    /// * '-v'    = 'INFO'
    /// * '-vv'   = 'DEBUG'
    /// * '-vvv'  = 'TRACE'
    ///
    /// Alternatively, set environment variable 'PERF_KONSUMER_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub verbose: u8,

    /// Quiet logging.
    ///
    /// * none    = 'WARN'
    /// * '-q'    = 'ERROR'
    /// * '-qq'   = 'OFF'
    ///
    /// Alternatively, set environment variable 'PERF_KONSUMER_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub quiet: u8,
}

impl Cli {
    pub fn parse_and_validate() -> Self {
        Self::parse()
    }

    pub fn verbosity_level(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }

    pub fn listen_on(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn build_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.bootstrap_brokers.clone())
            .set("client.id", self.client_id.clone())
            .set("group.id", self.group_id.clone())
            .set("auto.offset.reset", "latest");
        for cfg in &self.kafka_config {
            config.set(cfg.0.clone(), cfg.1.clone());
        }

        trace!("Created:\n{:#?}", config);
        config
    }

    pub fn build_perf_consumer_config(&self) -> PerfConsumerConfig {
        PerfConsumerConfig {
            topic: self.topic.clone(),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            auto_commit: self.auto_commit,
            max_concurrency: self.max_consumers as usize,
            max_buffered_messages: self.max_messages,
            initial_partition_count: self.partitions,
            termination_grace_period: Duration::from_secs(self.termination_timeout_secs),
            broker: self.build_client_config(),
        }
    }
}

/// A simple (key,value) pair of `String`s, useful to be parsed from arguments via [`kv_clap_value_parser`].
pub type KVPair = (String, String);

/// To be used as [`clap::value_parser`] function to create [`KVPair`] values.
fn kv_clap_value_parser(kv: &str) -> Result<KVPair, String> {
    let (k, v) = match kv.split_once(':') {
        None => {
            return Err("Should have 'K:V' format".to_string());
        },
        Some((k, v)) => (k, v),
    };

    Ok((k.to_string(), v.to_string()))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use clap::Parser;

    use super::{kv_clap_value_parser, Cli};

    #[test]
    fn test_kv_clap_value_parser() {
        assert_eq!(
            kv_clap_value_parser("security.protocol:SASL_SSL"),
            Ok(("security.protocol".to_string(), "SASL_SSL".to_string()))
        );
        assert_eq!(
            kv_clap_value_parser("bootstrap.servers:host:9092"),
            Ok(("bootstrap.servers".to_string(), "host:9092".to_string()))
        );
        assert!(kv_clap_value_parser("no-separator").is_err());
    }

    #[test]
    fn test_build_perf_consumer_config() {
        let cli = Cli::try_parse_from([
            "perf-konsumer",
            "--brokers",
            "localhost:9092",
            "--topic",
            "perf-topic",
            "--max-consumers",
            "3",
            "--partitions",
            "2",
            "--kafka-conf",
            "fetch.wait.max.ms:50",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbosity_level(), 2);

        let config = cli.build_perf_consumer_config();
        assert_eq!(config.topic, "perf-topic");
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.initial_partition_count, 2);
        assert_eq!(config.max_buffered_messages, 100);
        assert_eq!(config.poll_timeout, Duration::from_millis(1000));
        assert_eq!(config.termination_grace_period, Duration::from_secs(10));
        assert!(!config.auto_commit);
        assert_eq!(config.broker.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(config.broker.get("fetch.wait.max.ms"), Some("50"));
        assert_eq!(config.broker.get("auto.offset.reset"), Some("latest"));
    }

    #[test]
    fn test_max_consumers_must_be_positive() {
        let res = Cli::try_parse_from([
            "perf-konsumer",
            "--brokers",
            "localhost:9092",
            "--topic",
            "perf-topic",
            "--max-consumers",
            "0",
        ]);

        assert!(res.is_err());
    }
}
