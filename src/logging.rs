use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::constants::LOG_ENV_VAR;

/// Initialize logging, given a `verbosity_level`.
///
/// The `verbosity_level` is the difference between `-v` and `-q` flags passed on the command line.
/// If the environment variable [`LOG_ENV_VAR`] is set, it takes precedence.
pub fn init(verbosity_level: i8) {
    let mut builder = Builder::new();

    builder.filter_level(level_filter(verbosity_level));

    // librdkafka is chatty at debug level: keep it one notch quieter than us
    builder.filter_module("rdkafka", level_filter(verbosity_level.saturating_sub(1)));

    builder.parse_env(Env::new().filter(LOG_ENV_VAR));

    builder.init();
}

fn level_filter(verbosity_level: i8) -> LevelFilter {
    match verbosity_level {
        i8::MIN..=-2 => LevelFilter::Off,
        -1 => LevelFilter::Error,
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        3..=i8::MAX => LevelFilter::Trace,
    }
}
