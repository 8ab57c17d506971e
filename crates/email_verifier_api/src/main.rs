//! Email Verification API Server
//!
//! HTTP surface for the verification engine: batch verification with
//! multi-layer admission control, bounce reports and agent usage, built
//! with axum and tokio.

use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use verify_core::{RateGates, VerificationEngine};

mod agent;
mod api;
mod config;
mod routes;

use config::AppConfig;

/// Interval of the expired-entry sweep across caches and rate buckets.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
pub struct AppState {
    pub engine: VerificationEngine,
    pub gates: RateGates,
    pub config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_tracing(&config)?;

    info!("Starting Email Verification API v{}", env!("CARGO_PKG_VERSION"));

    let engine = VerificationEngine::new(config.engine.clone())
        .map_err(|e| format!("Failed to initialize verification engine: {e}"))?;
    let gates = RateGates::new(config.limits.clone());

    let state = Arc::new(AppState {
        engine,
        gates,
        config: config.clone(),
    });

    spawn_sweeper(Arc::clone(&state));

    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Verification API: POST http://{}/api/verify", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Create the main application router.
fn create_router(state: Arc<AppState>) -> Router {
    routes::build_routes(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(tower_http::cors::Any),
        )
        .layer(CompressionLayer::new())
}

/// Periodic cleanup of expired cache entries and rate buckets.
fn spawn_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            state.engine.sweep();
            state.gates.sweep();
        }
    });
}

/// Load configuration: defaults, optional Config.toml, environment.
fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if std::path::Path::new("Config.toml").exists() {
        figment = figment.merge(Toml::file("Config.toml"));
    }

    figment = figment.merge(Env::prefixed("VERIFIER_").split("__"));

    let config: AppConfig = figment.extract()?;
    Ok(config)
}

/// Initialize tracing and logging.
fn init_tracing(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_level.clone().into());

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
