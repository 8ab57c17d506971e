//! API Routes Module
//!
//! - `verify`: batch email verification
//! - `bounce`: crowd-sourced bounce reports
//! - `agent_usage`: per-agent quota introspection
//! - `health`: health checks and monitoring endpoints

pub mod agent_usage;
pub mod bounce;
pub mod health;
pub mod verify;

use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Build all API routes with the shared application state.
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/verify", post(verify::verify_handler))
        .route("/api/bounce", post(bounce::bounce_handler))
        .route("/api/agent/usage", get(agent_usage::usage_handler))
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}
