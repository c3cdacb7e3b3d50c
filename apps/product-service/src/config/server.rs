//! HTTP server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// HTTP server port for REST endpoints (/health, /api/v1/*).
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Deadline applied to requests without an `x-request-timeout-ms` header.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Largest accepted `limit` for product listing.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            request_timeout_ms: default_request_timeout_ms(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl ServerConfig {
    /// Default request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub(crate) fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

pub(crate) const fn default_http_port() -> u16 {
    50061
}

const fn default_request_timeout_ms() -> u64 {
    5_000
}

const fn default_max_page_size() -> u32 {
    100
}
