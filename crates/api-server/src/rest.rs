//! Shared REST state, error mapping and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use azora_billing::SubscriptionManager;
use azora_core::error::BillingError;
use azora_core::event_bus::EventLog;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SubscriptionManager>,
    pub events: Arc<EventLog>,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<SubscriptionManager>, events: Arc<EventLog>, node_id: impl Into<String>) -> Self {
        Self {
            manager,
            events,
            node_id: node_id.into(),
            start_time: Instant::now(),
        }
    }
}

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to its HTTP status and `{error, message}` body.
/// Internal failures are logged and answered with a generic message.
pub fn api_error(err: BillingError) -> ApiError {
    let status = match &err {
        BillingError::TierNotFound(_) | BillingError::Validation(_) => StatusCode::BAD_REQUEST,
        BillingError::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
        BillingError::InvalidTransition { .. } | BillingError::Conflict(_) => StatusCode::CONFLICT,
        BillingError::UsageLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BillingError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        BillingError::Config(_)
        | BillingError::Serialization(_)
        | BillingError::Io(_)
        | BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Request failed");
        "Internal processing error".to_string()
    } else {
        warn!(error = %err, code = err.code(), "Request rejected");
        err.to_string()
    };
    metrics::counter!("api.errors", "code" => err.code()).increment(1);

    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message,
        }),
    )
}

/// Map an extractor rejection (malformed JSON body, bad path id) to the
/// same `{error, message}` body the domain errors use.
pub fn rejection_error(status: StatusCode, message: String) -> ApiError {
    warn!(status = status.as_u16(), error = %message, "Request rejected");
    metrics::counter!("api.errors", "code" => "invalid_request").increment(1);
    (
        status,
        Json(ErrorResponse {
            error: "invalid_request".to_string(),
            message,
        }),
    )
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        tiers: state.manager.catalog().len(),
    })
}

/// GET /ready — Readiness probe.
/// Returns 200 once a non-empty pricing catalog is loaded.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic"),
        (status = 503, description = "No pricing catalog loaded"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.manager.catalog().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /live — Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub tiers: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (BillingError::TierNotFound("gold".into()), StatusCode::BAD_REQUEST),
            (BillingError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (BillingError::SubscriptionNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (BillingError::Conflict(Uuid::new_v4()), StatusCode::CONFLICT),
            (
                BillingError::UsageLimitExceeded { metric: "users", limit: 1, requested: 2 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BillingError::StorageUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            let code = err.code();
            let (status, body) = api_error(err);
            assert_eq!(status, expected);
            assert_eq!(body.error, code);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let (status, body) = api_error(BillingError::Internal(anyhow::anyhow!("db password wrong")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.message, "Internal processing error");
    }

    #[test]
    fn test_rejections_keep_status_and_error_shape() {
        let (status, body) = rejection_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing field `tier_id`".to_string(),
        );
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "invalid_request");
        assert_eq!(body.message, "missing field `tier_id`");
    }
}
