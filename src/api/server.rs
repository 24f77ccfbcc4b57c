//! HTTP server implementation for the archive API

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode,
    },
    routing::{get, post},
    Router,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::handlers;
use crate::core::factory::ConfiguredAppState;
use crate::core::{AppState, Result};
use crate::storage::StoreImpl;

/// Creates the main application router with all routes and middleware
pub fn create_app<S: StoreImpl>(app_state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(Any);
    let request_timeout = app_state.config.server.request_timeout;

    Router::new()
        // Pipeline
        .route("/api/cron/process-views", get(handlers::process_views::<S>))
        .route("/api/documents/{id}/views", post(handlers::track_view::<S>))

        // Document routes
        .route("/api/documents/{id}/stats", get(handlers::document_stats::<S>))
        .route(
            "/api/documents/{id}/comments",
            get(handlers::list_comments::<S>).post(handlers::add_comment::<S>),
        )
        .route(
            "/api/documents/{id}/likes",
            get(handlers::like_status::<S>).post(handlers::toggle_like::<S>),
        )

        // Analytics routes
        .route("/api/analytics/summary", get(handlers::analytics_summary::<S>))
        .route("/api/analytics/daily", get(handlers::daily_views::<S>))
        .route("/api/analytics/top", get(handlers::top_documents::<S>))

        // System routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::<S>))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(cors),
        )
        .with_state(app_state)
}

async fn serve_app(
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Start the HTTP server with the configured AppState
///
/// Returns once `shutdown` resolves and in-flight requests have finished.
pub async fn start_api_server(
    configured_app_state: ConfiguredAppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let http_addr = configured_app_state.http_addr();
    info!("Starting archive API server on {}", http_addr);

    match configured_app_state {
        ConfiguredAppState::Postgres { app_state } => {
            info!("Serving with Postgres backend");
            serve_app(http_addr, create_app(app_state), shutdown).await
        }
        ConfiguredAppState::Memory { app_state } => {
            info!("Serving with in-memory backend");
            serve_app(http_addr, create_app(app_state), shutdown).await
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(?err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(?err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
