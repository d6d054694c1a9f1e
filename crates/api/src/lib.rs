//! HTTP boundary for the storefront order workflow.
//!
//! Provides REST endpoints for placing orders, reading them back and moving
//! them through their lifecycle, with bearer-token principals, structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use domain::OrderWorkflow;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::PrincipalProvider;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// `/health` and `/metrics` are public; every order route requires a bearer
/// token known to the state's principal provider.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    let order_router = Router::new()
        .route("/orders", post(routes::orders::create::<S>))
        .route(
            "/orders/user/{user_id}",
            get(routes::orders::list_for_user::<S>),
        )
        .route("/orders/{id}/details", get(routes::orders::details::<S>))
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::orders::update_status::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.principals),
            auth::resolve_principal,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(order_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store and a principal provider.
pub fn create_state<S: OrderStore + 'static>(
    store: S,
    principals: Arc<dyn PrincipalProvider>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        workflow: OrderWorkflow::new(store),
        principals,
    })
}
