use std::result::Result;

use snafu::ResultExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{registry, EnvFilter};

use crate::config::Config;
use crate::error::{ApplicationError, InitializeLoggerSnafu};

const LOG_FILE: &str = "cat-meter.log";

/// Console output for humans, daily-rotated JSON files for machines.
///
/// The returned guard flushes the file writer on drop and must outlive the server.
pub fn init(config: &Config) -> Result<WorkerGuard, ApplicationError> {
    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = registry()
        .with(filter(config))
        .with(layer().pretty().with_writer(std::io::stdout))
        .with(layer().with_ansi(false).json().with_current_span(true).with_writer(writer));

    tracing::subscriber::set_global_default(subscriber).context(InitializeLoggerSnafu)?;

    Ok(guard)
}

/// `RUST_LOG` wins over `LOG_FILTER`. Malformed configured directives fall back to `info`.
fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|err| {
            eprintln!("invalid log filter `{}`: {}", config.log_filter, err);
            EnvFilter::new("info")
        })
}
