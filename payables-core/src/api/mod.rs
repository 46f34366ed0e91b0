use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::jwt_middleware;
use crate::service::PayablesService;
use crate::store::BillStore;

pub mod handlers;

#[cfg(test)]
mod tests;

/// Application state shared by every route handler.
#[derive(Clone)]
pub struct AppState<S> {
    pub service: PayablesService<S>,
    /// HS256 secret for bearer tokens.
    pub jwt_secret: Arc<str>,
}

impl<S: BillStore> AppState<S> {
    pub fn new(store: S, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            service: PayablesService::new(store),
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "payables-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
async fn db_health_check<S: BillStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state.service.store().ping().await.map_err(|e| {
        tracing::error!("Database health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Creates the main application router.
///
/// Everything under `/api` requires a bearer token whose claims carry the
/// caller's company; the health routes are public.
///
/// # Arguments
///
/// * `state` - Shared service and token secret
///
/// # Returns
///
/// Returns a configured Axum Router.
pub fn create_router<S: BillStore>(state: AppState<S>) -> Router {
    let protected = Router::new()
        .route(
            "/api/bills",
            post(handlers::create_bill::<S>).get(handlers::list_bills::<S>),
        )
        .route("/api/bills/statistics", get(handlers::statistics::<S>))
        .route(
            "/api/bills/:id",
            get(handlers::get_bill::<S>).patch(handlers::update_bill::<S>),
        )
        .route("/api/bills/:id/pay", post(handlers::record_payment::<S>))
        .route("/api/bills/:id/cancel", post(handlers::cancel_bill::<S>))
        .route(
            "/api/branches",
            post(handlers::create_branch::<S>).get(handlers::list_branches::<S>),
        )
        .route(
            "/api/suppliers",
            post(handlers::create_supplier::<S>).get(handlers::list_suppliers::<S>),
        )
        .route(
            "/api/categories",
            post(handlers::create_category::<S>).get(handlers::list_categories::<S>),
        )
        .route(
            "/api/payment-methods",
            post(handlers::create_payment_method::<S>).get(handlers::list_payment_methods::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_middleware::<S>,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check::<S>))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
