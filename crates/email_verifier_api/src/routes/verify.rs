//! Batch verification endpoint
//!
//! Admission gates run in order before any work: per-identity RPM, batch
//! cap, daily quota (reserve-then-proceed; excess addresses are silently
//! dropped), global ceiling, then the per-identity concurrency permit. The
//! permit is held for the whole request and released on scope exit.

use crate::agent::RequestIdentity;
use crate::api::{AgentUsageBlock, ApiError, ApiResult, VerifyRequest, VerifyResponse};
use crate::AppState;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// POST /api/verify
#[instrument(skip(state, request), fields(request_id, batch = request.emails.len()))]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    identity: RequestIdentity,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<VerifyResponse> {
    let request_id = Uuid::new_v4().to_string();
    tracing::Span::current().record("request_id", &request_id);

    if request.emails.is_empty() {
        warn!("empty batch refused");
        return Err(ApiError::BadRequest(
            "emails must be a non-empty array".to_string(),
        ));
    }

    let rate_key = identity.rate_key();
    // The returned admission holds the concurrency permit until this
    // handler returns, including every early error path below.
    let admission = state.gates.admit(&rate_key, request.emails.len())?;

    let accepted = &request.emails[..admission.granted.min(request.emails.len())];
    if accepted.len() < request.emails.len() {
        info!(
            "daily quota truncated batch from {} to {}",
            request.emails.len(),
            accepted.len()
        );
    }

    let results = state.engine.verify_batch(accepted).await;

    let agent = identity.agent.as_ref().map(|agent| AgentUsageBlock {
        uid: agent.uid.clone(),
        usage: state.gates.usage(&rate_key),
    });

    info!("verified {} addresses", results.len());
    drop(admission);
    Ok(Json(VerifyResponse { results, agent }))
}
