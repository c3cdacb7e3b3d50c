//! Product Service Binary
//!
//! Starts the product catalog HTTP service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin product-service
//! ```
//!
//! # Environment Variables
//!
//! - `PRODUCT_SERVICE_CONFIG`: Path to the YAML config (default: `config.yaml`, or built-in defaults)
//! - `RUST_LOG`: Log filter, overrides `observability.logging.level`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use product_service::config::{Config, StorageBackend, load_config};
use product_service::domain::catalog::ProductRepository;
use product_service::infrastructure::config::{Container, open_document, open_sqlite};
use product_service::infrastructure::http::create_router;
use product_service::observability::{MetricsConfig, init_metrics};
use product_service::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    let config = load_config(None)?;
    let _telemetry = init_telemetry(&config.observability)?;

    tracing::info!("Starting Product Service");
    log_config(&config);

    if config.observability.metrics_enabled {
        init_metrics(&MetricsConfig::for_port(config.observability.metrics_port))?;
    }

    match config.persistence.backend {
        StorageBackend::Sqlite => {
            let repository = open_sqlite(&config.persistence).await?;
            run(Arc::new(repository), &config).await
        }
        StorageBackend::Document => {
            let repository = open_document(&config.persistence)?;
            run(Arc::new(repository), &config).await
        }
    }
}

/// Serve until a shutdown signal, then close the store.
async fn run<R>(repository: Arc<R>, config: &Config) -> Result<(), Box<dyn std::error::Error>>
where
    R: ProductRepository + 'static,
{
    let container = Container::new(repository, config);
    let shutdown_token = CancellationToken::new();
    let app = create_router(container.app_state(config, shutdown_token.clone()));

    let http_addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.http_port).parse()?;

    tracing::info!(%http_addr, backend = container.repository().backend(), "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health");
    tracing::info!("  POST   /api/v1/products");
    tracing::info!("  GET    /api/v1/products?page&limit");
    tracing::info!("  GET    /api/v1/products/{{id}}");
    tracing::info!("  PUT    /api/v1/products/{{id}}");
    tracing::info!("  DELETE /api/v1/products/{{id}}");
    tracing::info!("  POST   /api/v1/products/{{id}}/increase");
    tracing::info!("  POST   /api/v1/products/{{id}}/decrease");
    tracing::info!("  GET    /api/v1/products/{{id}}/amount");
    tracing::info!("  POST   /api/v1/purchases");
    tracing::info!("  GET    /api/v1/users/{{user_id}}/purchases");

    let listener = TcpListener::bind(http_addr).await?;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_token));

    tracing::info!("Product service ready");

    if let Err(e) = server.await {
        tracing::error!("HTTP server error: {e}");
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, container.service().close()).await {
        Ok(Ok(())) => tracing::info!("Product store closed"),
        Ok(Err(e)) => tracing::error!(error = %e, "Failed to close product store"),
        Err(_) => tracing::error!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Timed out closing product store"
        ),
    }

    tracing::info!("Product service stopped");
    Ok(())
}

/// Log the loaded configuration.
fn log_config(config: &Config) {
    tracing::info!(
        bind_address = %config.server.bind_address,
        http_port = config.server.http_port,
        backend = %config.persistence.backend,
        request_timeout_ms = config.server.request_timeout_ms,
        max_page_size = config.server.max_page_size,
        retry_max_attempts = config.retry.max_attempts,
        metrics_enabled = config.observability.metrics_enabled,
        otel_enabled = config.observability.otel_enabled,
        "Configuration loaded"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the root token.
///
/// Requests still in flight observe the cancellation through their
/// context and fail with `CANCELLED`.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
