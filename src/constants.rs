/// Default `group.id` used by every Worker's consumer, unless overridden via `--group-id`.
pub(crate) const DEFAULT_GROUP_ID: &str = concat!(env!("CARGO_PKG_NAME"), "-group");

/// Environment variable that overrides the verbosity flags (`env_logger` filter syntax).
pub(crate) const LOG_ENV_VAR: &str = "PERF_KONSUMER_LOG";

// Defaults for the command line arguments.
pub(crate) const DEFAULT_POLL_TIMEOUT_MS: &str = "1000";
pub(crate) const DEFAULT_MAX_CONSUMERS: &str = "10";
pub(crate) const DEFAULT_MAX_MESSAGES: &str = "100";
pub(crate) const DEFAULT_PARTITIONS: &str = "1";
pub(crate) const DEFAULT_TERMINATION_TIMEOUT_SECS: &str = "10";
pub(crate) const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_HTTP_PORT: &str = "6564";

/// Upper bound on how many records a single poll cycle hands to a Worker.
pub(crate) const MAX_POLL_RECORDS: usize = 500;
