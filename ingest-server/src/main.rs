//! Continuous Assurance Ingest Server
//!
//! Accepts metric batches from collectors and serves read-only roll-ups of
//! the summary and detail stores.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    INGEST SERVER (Axum)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  Ingest   │  │  Token    │  │  Reports                │ │
//! │  │  /api     │  │  Auth     │  │  /api/v1/reports/*      │ │
//! │  └─────┬─────┘  └───────────┘  └────────────┬────────────┘ │
//! │        └─────────────────┬───────────────────┘              │
//! │                          ▼                                  │
//! │                  ┌───────────────┐                          │
//! │                  │ MetricsEngine │──▶ blob / sqlite mirrors │
//! │                  └───────────────┘                          │
//! │                   detail.parquet  summary.parquet           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod handlers;
mod middleware;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use assurance_core::{EngineConfig, MetricsEngine};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use middleware::auth::TokenRegistry;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "assurance_server=debug,assurance_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();

    tracing::info!("Continuous Assurance ingest server starting...");
    tracing::info!("Config: {} ({})", config.config_path.display(), config.environment);

    let engine_config = EngineConfig::from_file(&config.config_path)?;
    tracing::info!(
        "Stores: detail={} summary={}",
        engine_config.data.detail.display(),
        engine_config.data.summary.display()
    );

    // Build application state
    let state = AppState {
        tokens: Arc::new(TokenRegistry::new(&engine_config.tokens)),
        engine: Arc::new(MetricsEngine::from_env(engine_config)),
        config: config.clone(),
    };
    if state.tokens.is_empty() {
        if config.is_production() {
            anyhow::bail!("No tokens configured in {}", config.config_path.display());
        }
        tracing::warn!("No tokens configured; all authenticated routes will reject requests");
    }

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Shared application state, built once at start-up
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MetricsEngine>,
    pub tokens: Arc<TokenRegistry>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check));

    // Token-authenticated routes
    let api_routes = Router::new()
        // Ingest
        .route("/api", post(handlers::ingest::upload))
        .route("/api/v1/ingest", post(handlers::ingest::upload))

        // Reports
        .route("/api/v1/summary", get(handlers::reports::summary))
        .route("/api/v1/reports/overview", get(handlers::reports::overview))
        .route("/api/v1/reports/category", get(handlers::reports::category))
        .route("/api/v1/reports/dimension", get(handlers::reports::dimension))
        .route("/api/v1/reports/metrics", get(handlers::reports::metrics))
        .route("/api/v1/detail/:metric_id", get(handlers::reports::detail))
        .route("/api/v1/config/display", get(handlers::reports::display))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_token
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
