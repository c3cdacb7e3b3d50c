//! Prometheus metrics for the product service.
//!
//! Counters for stock adjustments, purchases, read retries, and API errors.
//! Recording is a no-op until [`init_metrics`] installs the exporter.
//!
//! # Example
//!
//! ```ignore
//! use product_service::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_stock_adjustment("decrease", "applied");
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const STOCK_ADJUSTMENTS: &str = "stock_adjustments_total";
const PURCHASES: &str = "purchases_total";
const READ_RETRIES: &str = "store_read_retries_total";
const API_ERRORS: &str = "api_errors_total";
const OPERATION_LATENCY: &str = "operation_latency_seconds";

/// Exporter listener and histogram layout.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Where `/metrics` is served.
    pub listen_addr: SocketAddr,
    /// Bucket bounds for the operation latency histogram, in seconds.
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self::for_port(9464)
    }
}

impl MetricsConfig {
    /// Listen on all interfaces at `port`.
    #[must_use]
    pub fn for_port(port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            latency_buckets: vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0],
        }
    }
}

/// The Prometheus exporter could not be built or installed.
#[derive(Debug, thiserror::Error)]
#[error("metrics exporter: {0}")]
pub struct MetricsError(#[from] BuildError);

/// Install the global Prometheus recorder and its HTTP listener.
///
/// # Errors
///
/// Fails on bad bucket bounds, a taken port, or a recorder already installed.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets_for_metric(
            Matcher::Full(OPERATION_LATENCY.to_string()),
            &config.latency_buckets,
        )?
        .install()?;

    describe_counter!(STOCK_ADJUSTMENTS, "Stock increase/decrease calls by outcome");
    describe_counter!(PURCHASES, "Purchase calls by debit mode and outcome");
    describe_counter!(READ_RETRIES, "Store reads retried after a transient failure");
    describe_counter!(API_ERRORS, "Error responses by code and HTTP status");
    describe_histogram!(OPERATION_LATENCY, metrics::Unit::Seconds, "Service operation latency");

    tracing::info!(addr = %config.listen_addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a stock adjustment.
///
/// * `direction` - "increase" or "decrease"
/// * `outcome` - "applied", "out_of_stock", "insufficient_stock", or "error"
pub fn record_stock_adjustment(direction: &str, outcome: &str) {
    counter!(
        STOCK_ADJUSTMENTS,
        "direction" => direction.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a purchase attempt.
pub fn record_purchase(debit_stock: bool, outcome: &str) {
    counter!(
        PURCHASES,
        "debit_stock" => debit_stock.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a retried store read.
pub fn record_read_retry(operation: &str) {
    counter!(READ_RETRIES, "operation" => operation.to_string()).increment(1);
}

/// Record an API error response.
pub fn record_api_error(code: &str, status: u16) {
    counter!(
        API_ERRORS,
        "code" => code.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the latency of a service operation.
pub fn record_operation_latency(operation: &str, latency_seconds: f64) {
    histogram!(OPERATION_LATENCY, "operation" => operation.to_string())
        .record(latency_seconds);
}
