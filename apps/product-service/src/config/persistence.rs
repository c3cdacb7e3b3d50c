//! Store configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which repository adapter to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite through `SQLx`.
    #[default]
    Sqlite,
    /// Embedded JSON document store.
    Document,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Repository adapter.
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Pool size for the SQLite backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Snapshot file for the document backend. In-memory only when unset.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            snapshot_path: None,
        }
    }
}

impl PersistenceConfig {
    /// Pool acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

fn default_database_url() -> String {
    "sqlite://./data/products.db?mode=rwc".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_acquire_timeout_ms() -> u64 {
    3_000
}
