//! Bounce-report endpoint
//!
//! IP-rate-limited intake of "this address bounced for me" reports. Only a
//! SHA-256 hash of the address is stored, together with the reporting IP;
//! addresses reported by two or more distinct IPs surface as a note in
//! later verifications.

use crate::agent::RequestIdentity;
use crate::api::{ApiError, ApiResult, BounceRequest, BounceResponse};
use crate::AppState;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;
use tracing::{debug, instrument};
use verify_core::email::ParsedEmail;

/// POST /api/bounce
#[instrument(skip(state, request))]
pub async fn bounce_handler(
    State(state): State<Arc<AppState>>,
    identity: RequestIdentity,
    Json(request): Json<BounceRequest>,
) -> ApiResult<BounceResponse> {
    state.gates.check_bounce(&identity.client_ip)?;

    let parsed = ParsedEmail::parse(&request.email);
    if !parsed.is_valid {
        return Err(ApiError::BadRequest("invalid email address".to_string()));
    }

    state
        .engine
        .bounce_reports()
        .report(&parsed.address, &identity.client_ip);
    debug!("bounce report accepted");

    Ok(Json(BounceResponse { status: "recorded" }))
}
