//! Donated Objects Backend
//!
//! REST service for cataloguing donated furniture and appliances, backed by SQLite.

mod api;
mod config;
mod db;
mod errors;
mod middleware;
mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Donated Objects Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Environment: {:?}", config.environment);

    // The service is unusable without its store, so a failed connection aborts startup
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let state = AppState {
        repo: repo.clone(),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    tracing::info!(
        "Statistics: http://localhost:{}/api/objetos/estatisticas",
        config.bind_addr.port()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    repo.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let expose_details = state.config.environment.is_development();

    let routes = Router::new()
        .route("/", get(index))
        .route(
            "/api/objetos",
            get(api::list_objects).post(api::create_object),
        )
        .route("/api/objetos/estatisticas", get(api::get_statistics))
        .route(
            "/api/objetos/{id}",
            get(api::get_object)
                .put(api::update_object)
                .delete(api::delete_object),
        )
        .route(
            "/api/objetos/{id}/indisponivel",
            patch(api::mark_unavailable),
        )
        .fallback(middleware::route_not_found)
        .method_not_allowed_fallback(middleware::route_not_found)
        .with_state(state);

    with_layers(routes, expose_details)
}

/// Wrap `router` in the cross-cutting layers shared by every route.
///
/// CORS wraps panic recovery, so panic 500s carry the cross-origin headers
/// too. `CorsLayer` answers every `OPTIONS` request itself.
pub fn with_layers(router: Router, expose_details: bool) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::cors_layer())
            .layer(CatchPanicLayer::custom(middleware::panic_responder(
                expose_details,
            )))
            .layer(DefaultBodyLimit::max(middleware::BODY_LIMIT)),
    )
}

/// Service banner and endpoint index.
async fn index() -> Json<Value> {
    Json(json!({
        "message": "API de Doação de Objetos funcionando!",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "objetos": "/api/objetos",
            "estatisticas": "/api/objetos/estatisticas"
        }
    }))
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests;
