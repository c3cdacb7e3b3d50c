//! Observability module for metrics.
//!
//! Prometheus counters and histograms for stock, purchase, and API activity.

mod metrics;

pub use self::metrics::{
    MetricsConfig, MetricsError, init_metrics, record_api_error, record_operation_latency,
    record_purchase, record_read_retry, record_stock_adjustment,
};
