//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the product service. Every request
//! gets a [`RequestContext`] whose token is a child of the shutdown token and
//! whose deadline comes from `x-request-timeout-ms` or the configured default.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;

use crate::application::ProductService;
use crate::domain::catalog::ProductRepository;
use crate::domain::shared::{ProductId, RequestContext, UserId};
use crate::error::ApiError;

use super::request::{AmountByRequest, ListProductsQuery, ProductRequest, PurchaseRequest};
use super::response::{
    AmountResponse, DeleteResponse, HealthResponse, ProductListResponse, ProductResponse,
    PurchaseEntryResponse, PurchaseHistoryResponse, StockAdjustmentResponse,
};

/// Header carrying a per-request deadline in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Application state shared across handlers.
pub struct AppState<R>
where
    R: ProductRepository,
{
    /// Product service.
    pub service: Arc<ProductService<R>>,
    /// Root token, cancelled on shutdown.
    pub shutdown: CancellationToken,
    /// Deadline applied when the request carries none.
    pub request_timeout: Duration,
    /// Application version.
    pub version: String,
}

impl<R> Clone for AppState<R>
where
    R: ProductRepository,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            shutdown: self.shutdown.clone(),
            request_timeout: self.request_timeout,
            version: self.version.clone(),
        }
    }
}

impl<R> AppState<R>
where
    R: ProductRepository,
{
    /// Build the context for one request.
    pub fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        let timeout = headers
            .get(REQUEST_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map_or(self.request_timeout, Duration::from_millis);
        RequestContext::with_token(self.shutdown.child_token()).with_timeout(timeout)
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<R>(state: AppState<R>) -> Router
where
    R: ProductRepository + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/products",
            post(create_product).get(list_products),
        )
        .route(
            "/api/v1/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/v1/products/{id}/increase", post(increase_amount))
        .route("/api/v1/products/{id}/decrease", post(decrease_amount))
        .route("/api/v1/products/{id}/amount", get(check_amount))
        .route("/api/v1/purchases", post(buy_product))
        .route("/api/v1/users/{user_id}/purchases", get(purchased_products))
        .with_state(state)
}

fn product_id(path: Result<Path<i64>, PathRejection>) -> Result<ProductId, ApiError> {
    path.map(|Path(id)| ProductId::new(id))
        .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))
}

fn user_id(path: Result<Path<String>, PathRejection>) -> Result<UserId, ApiError> {
    path.map(|Path(id)| UserId::new(id))
        .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))
}

/// Health check endpoint.
async fn health_check<R>(State(state): State<AppState<R>>) -> impl IntoResponse
where
    R: ProductRepository,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        backend: state.service.repository().backend().to_string(),
    })
}

async fn create_product<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    R: ProductRepository,
{
    let request = json_body(body)?;
    let ctx = state.request_context(&headers);
    let product = state.service.create_product(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

async fn get_product<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let ctx = state.request_context(&headers);
    let product = state.service.get_product(&ctx, id).await?;
    Ok(Json(product.into()))
}

async fn update_product<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let request = json_body(body)?;
    let ctx = state.request_context(&headers);
    let product = state.service.update_product(&ctx, id, request.into()).await?;
    Ok(Json(product.into()))
}

async fn delete_product<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let ctx = state.request_context(&headers);
    let outcome = state.service.delete_product(&ctx, id).await?;
    Ok(Json(outcome.into()))
}

async fn list_products<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<Json<ProductListResponse>, ApiError>
where
    R: ProductRepository,
{
    let Query(query) = query.map_err(|rejection| ApiError::invalid_request(rejection.body_text()))?;
    let ctx = state.request_context(&headers);
    let page = state
        .service
        .list_products(&ctx, query.page, query.limit)
        .await?;
    Ok(Json(page.into()))
}

async fn increase_amount<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<AmountByRequest>, JsonRejection>,
) -> Result<Json<StockAdjustmentResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let request = json_body(body)?;
    let ctx = state.request_context(&headers);
    let adjustment = state
        .service
        .increase_amount(&ctx, id, request.amount_by)
        .await?;
    Ok(Json(adjustment.into()))
}

async fn decrease_amount<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<AmountByRequest>, JsonRejection>,
) -> Result<Json<StockAdjustmentResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let request = json_body(body)?;
    let ctx = state.request_context(&headers);
    let adjustment = state
        .service
        .decrease_amount(&ctx, id, request.amount_by)
        .await?;
    Ok(Json(adjustment.into()))
}

async fn check_amount<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<AmountResponse>, ApiError>
where
    R: ProductRepository,
{
    let id = product_id(path)?;
    let ctx = state.request_context(&headers);
    let check = state.service.check_amount(&ctx, id).await?;
    Ok(Json(check.into()))
}

async fn buy_product<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError>
where
    R: ProductRepository,
{
    let request = json_body(body)?;
    let ctx = state.request_context(&headers);
    let product = state.service.buy_product(&ctx, request.into()).await?;
    Ok(Json(product.into()))
}

async fn purchased_products<R>(
    State(state): State<AppState<R>>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<PurchaseHistoryResponse>, ApiError>
where
    R: ProductRepository,
{
    let user_id = user_id(path)?;
    let ctx = state.request_context(&headers);
    let entries = state.service.purchased_products(&ctx, &user_id).await?;
    Ok(Json(PurchaseHistoryResponse {
        products: entries.into_iter().map(PurchaseEntryResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpErrorResponse;
    use crate::infrastructure::persistence::DocumentProductRepository;
    use axum::body::Body;
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn create_test_state() -> AppState<DocumentProductRepository> {
        let repository = Arc::new(DocumentProductRepository::in_memory());
        AppState {
            service: Arc::new(ProductService::new(repository).with_max_page_size(20)),
            shutdown: CancellationToken::new(),
            request_timeout: Duration::from_secs(5),
            version: "1.0.0-test".to_string(),
        }
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn seed(app: &Router, name: &str, amount: i64) -> ProductResponse {
        let body = serde_json::json!({
            "name": name,
            "description": "seeded",
            "price": "4.20",
            "amount": amount
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/products", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await
    }

    #[tokio::test]
    async fn health_check_reports_backend() {
        let app = create_router(create_test_state());

        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = read_json(response).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.backend, "document");
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = create_router(create_test_state());
        let created = seed(&app, "Kettle", 3).await;

        let response = app
            .oneshot(empty_request(
                "GET",
                &format!("/api/v1/products/{}", created.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let fetched: ProductResponse = read_json(response).await;
        assert_eq!(fetched.name, "Kettle");
        assert_eq!(fetched.amount, 3);
        assert_eq!(fetched.price, created.price);
    }

    #[tokio::test]
    async fn get_unknown_product_is_not_found() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(empty_request("GET", "/api/v1/products/999"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.code, "PRODUCT_NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_body_is_validation_failure() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/products",
                &serde_json::json!({ "name": 12 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.code, "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn non_numeric_id_is_validation_failure() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(empty_request("GET", "/api/v1/products/abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_amount_is_validation_failure() {
        let app = create_router(create_test_state());
        let body = serde_json::json!({ "name": "Vase", "description": "glass", "price": "9.00" });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/products", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.code, "VALIDATION_FAILED");

        let created = seed(&app, "Vase", 4).await;
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/products/{}", created.id),
                &body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(empty_request(
                "GET",
                &format!("/api/v1/products/{}/amount", created.id),
            ))
            .await
            .unwrap();
        let amount: AmountResponse = read_json(response).await;
        assert_eq!(amount.amount, 4);
    }

    #[tokio::test]
    async fn undecodable_user_id_is_validation_failure() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(empty_request("GET", "/api/v1/users/%FF/purchases"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.code, "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let app = create_router(create_test_state());
        let body = serde_json::json!({ "name": "Bad", "price": "-1", "amount": 1 });

        let response = app
            .oneshot(json_request("POST", "/api/v1/products", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.details.get("field").map(String::as_str), Some("price"));
    }

    #[tokio::test]
    async fn decrease_beyond_stock_is_soft_refusal() {
        let app = create_router(create_test_state());
        let created = seed(&app, "Cup", 2).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/products/{}/decrease", created.id),
                &serde_json::json!({ "amount_by": 5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let adjustment: StockAdjustmentResponse = read_json(response).await;
        assert!(!adjustment.is_enough);
        assert_eq!(adjustment.product.amount, 2);
    }

    #[tokio::test]
    async fn debit_purchase_without_stock_conflicts() {
        let app = create_router(create_test_state());
        let created = seed(&app, "Plate", 1).await;
        let body = serde_json::json!({
            "user_id": "u-7",
            "product_id": created.id,
            "amount": 2,
            "debit_stock": true
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/purchases", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(empty_request("GET", "/api/v1/users/u-7/purchases"))
            .await
            .unwrap();
        let history: PurchaseHistoryResponse = read_json(response).await;
        assert!(history.products.is_empty());
    }

    #[tokio::test]
    async fn list_rejects_limit_above_maximum() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(empty_request("GET", "/api/v1/products?page=1&limit=21"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn shutdown_cancels_requests() {
        let state = create_test_state();
        state.shutdown.cancel();
        let app = create_router(state);

        let response = app
            .oneshot(empty_request("GET", "/api/v1/products/1/amount"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let error: HttpErrorResponse = read_json(response).await;
        assert_eq!(error.code, "CANCELLED");
    }

    #[test]
    fn request_context_honours_timeout_header() {
        let state = create_test_state();
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_TIMEOUT_HEADER, "50".parse().unwrap());

        let ctx = state.request_context(&headers);
        let remaining = ctx
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(tokio::time::Instant::now()))
            .unwrap();
        assert!(remaining <= Duration::from_millis(50));
    }
}
