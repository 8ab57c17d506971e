//! Shared API types and error handling
//!
//! Wire shapes for the verification, bounce and usage endpoints, plus the
//! typed error that maps every refusal to its HTTP status: 400 for user
//! errors, 401 for missing agent auth, 429 for rate gates (with
//! `Retry-After` where meaningful) and 503 for the global ceiling.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use verify_core::ratelimit::Usage;
use verify_core::{AdmissionError, VerifyResult};

/// Request body for POST /api/verify.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub emails: Vec<String>,
}

/// Usage block returned to authenticated agents.
#[derive(Debug, Serialize)]
pub struct AgentUsageBlock {
    pub uid: String,
    pub usage: Usage,
}

/// Response body for POST /api/verify.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub results: Vec<VerifyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentUsageBlock>,
}

/// Request body for POST /api/bounce.
#[derive(Debug, Deserialize)]
pub struct BounceRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct BounceResponse {
    pub status: &'static str,
}

/// Response body for GET /api/agent/usage.
#[derive(Debug, Serialize)]
pub struct AgentUsageResponse {
    pub uid: String,
    pub usage: Usage,
}

/// Error response structure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
    pub request_id: String,
    pub timestamp: String,
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// API error types.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Admission(AdmissionError),
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        ApiError::Admission(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, retry_after) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Admission(err) => match &err {
                AdmissionError::BatchTooLarge { .. } => {
                    (StatusCode::BAD_REQUEST, "BATCH_TOO_LARGE", err.to_string(), None)
                }
                AdmissionError::RpmExceeded { retry_after } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    err.to_string(),
                    Some(retry_after.as_secs()),
                ),
                AdmissionError::DailyExhausted { retry_after } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "DAILY_QUOTA_EXHAUSTED",
                    err.to_string(),
                    Some(retry_after.as_secs()),
                ),
                AdmissionError::TooManyConcurrent => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "TOO_MANY_CONCURRENT",
                    err.to_string(),
                    None,
                ),
                AdmissionError::GlobalExhausted => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "GLOBAL_CAPACITY",
                    err.to_string(),
                    None,
                ),
            },
        };

        let body = ErrorBody {
            error: message,
            error_code: error_code.to_string(),
            request_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn batch_too_large_maps_to_400() {
        let response =
            ApiError::Admission(AdmissionError::BatchTooLarge { max: 500 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rpm_refusal_maps_to_429_with_retry_after() {
        let response = ApiError::Admission(AdmissionError::RpmExceeded {
            retry_after: Duration::from_secs(120),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "120"
        );
    }

    #[test]
    fn global_ceiling_maps_to_503() {
        let response = ApiError::Admission(AdmissionError::GlobalExhausted).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let response = ApiError::Unauthorized("agent signature required".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
