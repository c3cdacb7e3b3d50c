//! Dependency Injection Container
//!
//! Opens the configured store and wires the product service and HTTP state
//! around it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ProductService;
use crate::config::{Config, PersistenceConfig};
use crate::domain::catalog::{CatalogError, ProductRepository};
use crate::infrastructure::http::AppState;
use crate::infrastructure::persistence::{DocumentProductRepository, SqlProductRepository};

/// Dependency injection container.
///
/// Holds the repository and the service built on it.
pub struct Container<R>
where
    R: ProductRepository + 'static,
{
    repository: Arc<R>,
    service: Arc<ProductService<R>>,
}

impl<R> Container<R>
where
    R: ProductRepository + 'static,
{
    /// Wire the service around `repository` using the server and retry settings.
    pub fn new(repository: Arc<R>, config: &Config) -> Self {
        let service = ProductService::new(Arc::clone(&repository))
            .with_retry_policy(config.retry.policy())
            .with_max_page_size(config.server.max_page_size);
        Self {
            repository,
            service: Arc::new(service),
        }
    }

    /// Get the repository.
    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repository)
    }

    /// Get the product service.
    pub fn service(&self) -> Arc<ProductService<R>> {
        Arc::clone(&self.service)
    }

    /// HTTP state bound to the shutdown token.
    pub fn app_state(&self, config: &Config, shutdown: CancellationToken) -> AppState<R> {
        AppState {
            service: self.service(),
            shutdown,
            request_timeout: config.server.request_timeout(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Open the SQLite repository and run migrations.
///
/// # Errors
///
/// `Unavailable` if the database cannot be reached, `Write` if migrations fail.
pub async fn open_sqlite(config: &PersistenceConfig) -> Result<SqlProductRepository, CatalogError> {
    SqlProductRepository::connect(
        &config.database_url,
        config.max_connections,
        config.acquire_timeout(),
    )
    .await
}

/// Open the document repository, loading the snapshot if one is configured.
///
/// # Errors
///
/// `Unavailable` if the snapshot cannot be read, `Storage` if it cannot be parsed.
pub fn open_document(config: &PersistenceConfig) -> Result<DocumentProductRepository, CatalogError> {
    match &config.snapshot_path {
        Some(path) => DocumentProductRepository::open(path),
        None => Ok(DocumentProductRepository::in_memory()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::domain::shared::RequestContext;

    #[tokio::test]
    async fn test_container_applies_page_size() {
        let mut config = Config::default();
        config.server.max_page_size = 5;
        let container = Container::new(Arc::new(DocumentProductRepository::in_memory()), &config);

        let err = container
            .service()
            .list_products(&RequestContext::background(), 1, 6)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_open_sqlite_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("products.db").display());
        let config = PersistenceConfig {
            database_url: url,
            ..PersistenceConfig::default()
        };

        let repository = open_sqlite(&config).await.unwrap();
        assert_eq!(repository.backend(), "sqlite");
        repository.close().await.unwrap();
    }

    #[test]
    fn test_open_document_without_snapshot() {
        let config = PersistenceConfig {
            backend: StorageBackend::Document,
            ..PersistenceConfig::default()
        };
        let repository = open_document(&config).unwrap();
        assert_eq!(repository.backend(), "document");
    }

    #[test]
    fn test_app_state_uses_configured_timeout() {
        let mut config = Config::default();
        config.server.request_timeout_ms = 1_234;
        let container = Container::new(Arc::new(DocumentProductRepository::in_memory()), &config);

        let state = container.app_state(&config, CancellationToken::new());
        assert_eq!(state.request_timeout.as_millis(), 1_234);
    }
}
