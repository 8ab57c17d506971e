//! Agent usage endpoint
//!
//! Today's consumption against the daily cap for the authenticated agent.
//! Requires the agent-signature middleware to have attached an identity.

use crate::agent::RequestIdentity;
use crate::api::{AgentUsageResponse, ApiError, ApiResult};
use crate::AppState;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;
use tracing::instrument;

/// GET /api/agent/usage
#[instrument(skip(state))]
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    identity: RequestIdentity,
) -> ApiResult<AgentUsageResponse> {
    let Some(agent) = identity.agent.as_ref() else {
        return Err(ApiError::Unauthorized(
            "agent signature required".to_string(),
        ));
    };

    let usage = state.gates.usage(&identity.rate_key());
    Ok(Json(AgentUsageResponse {
        uid: agent.uid.clone(),
        usage,
    }))
}
