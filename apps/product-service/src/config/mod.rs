//! Configuration module for the product service.
//!
//! Provides configuration loading, validation, and environment variable
//! interpolation. Configuration is read once at startup and never changes
//! afterwards.
//!
//! # Usage
//!
//! ```rust,ignore
//! use product_service::config::{Config, load_config};
//!
//! // Load from $PRODUCT_SERVICE_CONFIG, falling back to config.yaml or defaults
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("HTTP port: {}", config.server.http_port);
//! ```

mod observability;
mod persistence;
mod retry;
mod server;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use observability::{LoggingConfig, ObservabilityConfig};
pub use persistence::{PersistenceConfig, StorageBackend};
pub use retry::RetryConfig;
pub use server::ServerConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "PRODUCT_SERVICE_CONFIG";

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Store configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Read retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// Path resolution: `path`, then `$PRODUCT_SERVICE_CONFIG`, then
/// `config.yaml`. Only the last one may be missing, in which case the
/// defaults are used.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let explicit = path
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()));

    let path = match explicit {
        Some(path) => path,
        None if !Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::default();
            validate_config(&config)?;
            return Ok(config);
        }
        None => DEFAULT_CONFIG_PATH.to_string(),
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_port == 0 {
        return Err(invalid("server.http_port must be non-zero"));
    }
    if server.request_timeout_ms == 0 {
        return Err(invalid("server.request_timeout_ms must be positive"));
    }
    if server.max_page_size == 0 {
        return Err(invalid("server.max_page_size must be at least 1"));
    }

    let persistence = &config.persistence;
    if persistence.backend == StorageBackend::Sqlite {
        if persistence.database_url.trim().is_empty() {
            return Err(invalid("persistence.database_url must be set for the sqlite backend"));
        }
        if persistence.max_connections == 0 {
            return Err(invalid("persistence.max_connections must be at least 1"));
        }
        if persistence.acquire_timeout_ms == 0 {
            return Err(invalid("persistence.acquire_timeout_ms must be positive"));
        }
    }

    let retry = &config.retry;
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(invalid(
            "retry.initial_backoff_ms must not exceed retry.max_backoff_ms",
        ));
    }
    if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
        return Err(invalid("retry.backoff_multiplier must be at least 1.0"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(invalid("retry.jitter_factor must be between 0.0 and 1.0"));
    }

    let observability = &config.observability;
    let valid_formats = ["json", "pretty"];
    if !valid_formats
        .iter()
        .any(|f| observability.logging.format.eq_ignore_ascii_case(f))
    {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }
    if observability.metrics_enabled {
        if observability.metrics_port == 0 {
            return Err(invalid("observability.metrics_port must be non-zero"));
        }
        if observability.metrics_port == server.http_port {
            return Err(invalid(
                "observability.metrics_port and server.http_port must be different",
            ));
        }
    }
    if observability.otel_enabled && observability.otel_endpoint.trim().is_empty() {
        return Err(invalid("observability.otel_endpoint must be set when otel is enabled"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
