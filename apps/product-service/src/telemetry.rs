//! Tracing Setup
//!
//! Console logging through `tracing-subscriber`, plus an optional
//! OpenTelemetry OTLP exporter.
//!
//! # Configuration
//!
//! - `observability.logging.level`: default filter when `RUST_LOG` is unset
//! - `observability.logging.format`: `json` or `pretty`
//! - `observability.otel_enabled`: export spans over OTLP gRPC
//! - `observability.otel_endpoint`: OTLP endpoint (default: `http://localhost:4317`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use product_service::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(&config.observability)?;
//!     // ... application code
//! }
//! ```

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ObservabilityConfig;

/// Telemetry setup errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log level is not a valid filter directive.
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter {
        /// Filter string.
        filter: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Guard that shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}

/// Initialize logging and, when enabled, OpenTelemetry tracing.
///
/// Returns a guard that will shut down the tracer provider when dropped.
/// A failure to build the OTLP exporter falls back to console logging.
///
/// # Errors
///
/// Returns an error if the log level cannot be parsed or a subscriber is
/// already installed.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = build_filter(&config.logging.level)?;
    let json = config.logging.is_json();

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().boxed()
    };

    if !config.otel_enabled {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Install(e.to_string()))?;

        tracing::info!(json, "OpenTelemetry disabled, using console logging only");
        return Ok(TelemetryGuard { provider: None });
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()
    {
        Ok(exp) => exp,
        Err(e) => {
            Registry::default()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::Install(e.to_string()))?;
            tracing::warn!(error = ?e, "Failed to create OTLP exporter, falling back to console logging");
            return Ok(TelemetryGuard { provider: None });
        }
    };

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Install(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        endpoint = %config.otel_endpoint,
        "OpenTelemetry initialized"
    );

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}

/// `RUST_LOG` wins over the configured level.
fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| TelemetryError::InvalidFilter {
        filter: level.to_string(),
        message: e.to_string(),
    })
}
