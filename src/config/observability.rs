use serde::{Deserialize, Serialize};

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include file/line information.
    #[serde(default)]
    pub file_line: bool,

    /// Filter directives (e.g., "realmguard=debug").
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            file_line: false,
            filter: None,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON format (for log aggregation).
    Json,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults() {
        let config: ObservabilityConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.logging.timestamps);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_logging_parse() {
        let config: ObservabilityConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            format = "json"
            filter = "realmguard=trace"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter.as_deref(), Some("realmguard=trace"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ObservabilityConfig, _> = toml::from_str("[logging]\ncolour = true");
        assert!(result.is_err());
    }
}
