//! Health check and monitoring routes

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: std::time::SystemTime,
}

/// Health check endpoint - GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: std::time::SystemTime::now(),
    })
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: std::time::SystemTime,
}

/// Readiness check endpoint - GET /ready
///
/// The engine is constructed at startup; readiness is a cheap liveness
/// check over its shared state rather than an outbound probe.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let _stats = state.engine.stats();
    Json(ReadinessResponse {
        ready: true,
        timestamp: std::time::SystemTime::now(),
    })
}

/// Metrics endpoint - GET /metrics
///
/// Prometheus-compatible text exposition of the engine's cache and store
/// counters.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let stats = state.engine.stats();

    let metrics = format!(
        "# HELP email_verifier_mx_cache_entries Entries in the MX cache\n\
         # TYPE email_verifier_mx_cache_entries gauge\n\
         email_verifier_mx_cache_entries {}\n\
         \n\
         # HELP email_verifier_intel_cache_entries Entries in the domain-intel cache\n\
         # TYPE email_verifier_intel_cache_entries gauge\n\
         email_verifier_intel_cache_entries {}\n\
         \n\
         # HELP email_verifier_dkim_cache_entries Entries in the DKIM scan cache\n\
         # TYPE email_verifier_dkim_cache_entries gauge\n\
         email_verifier_dkim_cache_entries {}\n\
         \n\
         # HELP email_verifier_behavior_hosts Mail hosts with behavior statistics\n\
         # TYPE email_verifier_behavior_hosts gauge\n\
         email_verifier_behavior_hosts {}\n\
         \n\
         # HELP email_verifier_bounce_entries Addresses with bounce reports\n\
         # TYPE email_verifier_bounce_entries gauge\n\
         email_verifier_bounce_entries {}\n\
         \n\
         # HELP email_verifier_rate_identities Tracked rate-limit identities\n\
         # TYPE email_verifier_rate_identities gauge\n\
         email_verifier_rate_identities {}\n\
         \n\
         # HELP email_verifier_batch_cap Maximum addresses per request\n\
         # TYPE email_verifier_batch_cap gauge\n\
         email_verifier_batch_cap {}\n\
         \n\
         # HELP email_verifier_build_info Build information\n\
         # TYPE email_verifier_build_info gauge\n\
         email_verifier_build_info{{version=\"{}\"}} 1\n",
        stats.mx_cache_entries,
        stats.intel_cache_entries,
        stats.dkim_cache_entries,
        stats.behavior_hosts,
        stats.bounce_entries,
        state.gates.tracked_identities(),
        state.config.limits.max_batch_size,
        env!("CARGO_PKG_VERSION")
    );

    (StatusCode::OK, metrics)
}
