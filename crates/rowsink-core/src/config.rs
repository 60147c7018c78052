//! Configuration structures for rowsink.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Backend endpoint configuration
    pub backend: BackendConfig,

    /// Write buffer configuration
    pub writer: WriterConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Bulk-write backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URI of the bulk-write service
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Bearer token sent with every request
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Circuit breaker settings guarding the endpoint
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds to wait before probing a failed endpoint again
    #[serde(default = "default_reset_timeout_seconds")]
    pub reset_timeout_seconds: u64,

    /// Successes required to close the circuit from half-open
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_seconds: default_reset_timeout_seconds(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// Write buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    /// Table all buffered requests are written to
    pub table: String,

    /// Maximum number of requests sent per bulk-write call; the buffer is
    /// flushed once it reaches this length
    #[serde(default = "default_flush_amount")]
    pub flush_amount: usize,

    /// Primary key attribute names. When set, a newly buffered request
    /// replaces any buffered request with the same key values.
    #[serde(default)]
    pub dedup_keys: Option<Vec<String>>,

    /// Pause in milliseconds between drain iterations on close while the
    /// backend keeps returning unprocessed requests
    #[serde(default)]
    pub exit_backoff_ms: u64,
}

/// Monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Directive string understood by tracing's `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_request_timeout_seconds() -> u64 {
    30
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_reset_timeout_seconds() -> u64 {
    30
}
fn default_success_threshold() -> u32 {
    2
}
fn default_flush_amount() -> usize {
    25
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.backend.endpoint.is_empty() {
            return Err(crate::Error::Config("Backend endpoint is required".into()));
        }

        if self.writer.table.is_empty() {
            return Err(crate::Error::Config("Writer table is required".into()));
        }

        if self.writer.flush_amount == 0 {
            return Err(crate::Error::Config(
                "flush_amount must be greater than zero".into(),
            ));
        }

        if let Some(keys) = &self.writer.dedup_keys {
            if keys.is_empty() {
                return Err(crate::Error::Config(
                    "dedup_keys must name at least one attribute".into(),
                ));
            }
            if keys.iter().any(|key| key.is_empty()) {
                return Err(crate::Error::Config(
                    "dedup_keys must not contain empty attribute names".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            backend: BackendConfig {
                endpoint: "http://localhost:8181".into(),
                request_timeout_seconds: default_request_timeout_seconds(),
                bearer_token: None,
                circuit_breaker: CircuitBreakerSettings::default(),
            },
            writer: WriterConfig {
                table: "events".into(),
                flush_amount: default_flush_amount(),
                dedup_keys: None,
                exit_backoff_ms: 0,
            },
            monitoring: MonitoringConfig::default(),
        }
    }

    #[test]
    fn test_config_parses_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            endpoint = "http://localhost:8181"
            bearer_token = "secret"

            [writer]
            table = "events"
            dedup_keys = ["pk", "sk"]
            exit_backoff_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.endpoint, "http://localhost:8181");
        assert_eq!(config.backend.bearer_token.as_deref(), Some("secret"));
        assert_eq!(config.writer.flush_amount, 25);
        assert_eq!(
            config.writer.dedup_keys,
            Some(vec!["pk".to_string(), "sk".to_string()])
        );
        assert_eq!(config.writer.exit_backoff_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_writer_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            endpoint = "http://localhost:8181"

            [writer]
            table = "events"
            "#,
        )
        .unwrap();

        assert_eq!(config.writer.flush_amount, 25);
        assert!(config.writer.dedup_keys.is_none());
        assert_eq!(config.writer.exit_backoff_ms, 0);
        assert_eq!(config.backend.request_timeout_seconds, 30);
    }

    #[test]
    fn test_validation_rejects_empty_endpoint() {
        let mut config = base_config();
        config.backend.endpoint = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_validation_rejects_empty_table() {
        let mut config = base_config();
        config.writer.table = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn test_validation_rejects_zero_flush_amount() {
        let mut config = base_config();
        config.writer.flush_amount = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush_amount"));
    }

    #[test]
    fn test_validation_rejects_empty_dedup_keys() {
        let mut config = base_config();
        config.writer.dedup_keys = Some(vec![]);
        assert!(config.validate().is_err());

        config.writer.dedup_keys = Some(vec!["pk".into(), "".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_circuit_breaker_settings() {
        let settings = CircuitBreakerSettings::default();
        assert_eq!(settings.failure_threshold, 5);
        assert_eq!(settings.reset_timeout_seconds, 30);
        assert_eq!(settings.success_threshold, 2);
    }

    #[test]
    fn test_log_level_filter_directives() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
    }

    #[test]
    fn test_log_format_variants() {
        assert_eq!(LogFormat::default(), LogFormat::Json);
        assert_ne!(LogFormat::Json, LogFormat::Text);
    }
}
