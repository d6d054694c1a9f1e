//! API server entry point.

use std::sync::Arc;

use api::auth::{PrincipalProvider, StaticTokenProvider};
use api::config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: OrderStore + 'static>(
    config: &Config,
    store: S,
    principals: Arc<dyn PrincipalProvider>,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(store, principals);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Principal provider from the configured token table
    let configured_tokens = config
        .auth_tokens
        .as_deref()
        .map(StaticTokenProvider::parse)
        .transpose()
        .expect("invalid AUTH_TOKENS");

    // 4. Pick the store and start serving
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresOrderStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!(
                max_connections = config.database_max_connections,
                "using postgres order store"
            );

            let tokens = configured_tokens.unwrap_or_default();
            if tokens.is_empty() {
                tracing::warn!("AUTH_TOKENS is empty; every order request will be rejected");
            }
            serve(&config, store, Arc::new(tokens), metrics_handle).await;
        }
        None => {
            let store = InMemoryOrderStore::new();
            api::seed::seed_demo_data(&store).await;
            let tokens = configured_tokens.unwrap_or_else(|| {
                tracing::warn!(
                    admin = api::seed::DEMO_ADMIN_TOKEN,
                    client = api::seed::DEMO_CLIENT_TOKEN,
                    "AUTH_TOKENS not set; accepting demo tokens"
                );
                api::seed::demo_tokens()
            });
            tracing::info!("using in-memory order store seeded with demo data");
            serve(&config, store, Arc::new(tokens), metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
