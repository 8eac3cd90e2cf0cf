//! Tracing subscriber setup for binaries embedding the security manager.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig, ObservabilityConfig};

/// Initialize the global tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level and filter.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TracingError> {
    let logging = &config.logging;
    let filter = build_env_filter(logging);

    let result = match (&logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Pretty, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = config.level.to_tracing_level().to_string().to_lowercase();

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(&base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(&base_level))
    } else {
        EnvFilter::new(base_level)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}
