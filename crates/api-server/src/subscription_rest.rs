//! Subscription lifecycle and pricing REST endpoints.

use crate::rest::{api_error, rejection_error, ApiError, AppState, ErrorResponse};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use azora_billing::{NotificationDecision, SubscriptionView, SweepReport, TransitionOutcome};
use azora_core::types::{
    CreateSubscriptionRequest, PricingTier, Subscription, SubscriptionEvent, UsageUpdate,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// POST /v1/subscriptions — Start a subscription in its free trial.
#[utoipa::path(
    post,
    path = "/v1/subscriptions",
    tag = "Subscriptions",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 400, description = "Unknown tier or invalid input", body = ErrorResponse),
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    request: Result<Json<CreateSubscriptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let Json(request) = request.map_err(|r| rejection_error(r.status(), r.body_text()))?;
    let subscription = state
        .manager
        .create(request, Utc::now())
        .map_err(api_error)?;
    metrics::counter!("api.subscriptions.created").increment(1);
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /v1/subscriptions?organization_id= — Subscriptions of one organization.
#[utoipa::path(
    get,
    path = "/v1/subscriptions",
    tag = "Subscriptions",
    params(ListSubscriptionsQuery),
    responses(
        (status = 200, description = "Subscriptions, newest first", body = [Subscription]),
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    query: Result<Query<ListSubscriptionsQuery>, QueryRejection>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let Query(query) = query.map_err(|r| rejection_error(r.status(), r.body_text()))?;
    state
        .manager
        .list_for_organization(&query.organization_id)
        .map(Json)
        .map_err(api_error)
}

/// GET /v1/subscriptions/:id — Subscription with its current pricing.
#[utoipa::path(
    get,
    path = "/v1/subscriptions/{id}",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription pricing view", body = SubscriptionView),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let id = path_id(id)?;
    state
        .manager
        .view(id, Utc::now())
        .map(Json)
        .map_err(api_error)
}

/// POST /v1/subscriptions/:id/process-transition — Materialize the current phase.
#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/process-transition",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Transition processed", body = TransitionOutcome),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
        (status = 409, description = "Subscription is cancelled", body = ErrorResponse),
    )
)]
pub async fn process_transition(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = path_id(id)?;
    let outcome = state
        .manager
        .process_transition(id, Utc::now())
        .map_err(api_error)?;
    if outcome.changed {
        metrics::counter!("api.transitions").increment(1);
    }
    Ok(Json(outcome))
}

/// POST /v1/subscriptions/:id/cancel — Cancel from any state.
#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/cancel",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Subscription cancelled", body = Subscription),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let id = path_id(id)?;
    let Json(request) = request.map_err(|r| rejection_error(r.status(), r.body_text()))?;
    state
        .manager
        .cancel(id, request.reason, Utc::now())
        .map(Json)
        .map_err(api_error)
}

/// GET /v1/subscriptions/:id/check-notifications — Is a "phase ending" notice due?
#[utoipa::path(
    get,
    path = "/v1/subscriptions/{id}/check-notifications",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Notification decision", body = NotificationDecision),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn check_notifications(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<NotificationDecision>, ApiError> {
    let id = path_id(id)?;
    let decision = state
        .manager
        .notification(id, Utc::now())
        .map_err(api_error)?;
    if decision.should_notify {
        metrics::counter!("api.notifications.due", "phase" => decision.phase.as_str()).increment(1);
    }
    Ok(Json(decision))
}

/// POST /v1/subscriptions/:id/usage — Replace usage counters.
#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/usage",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    request_body = UsageUpdate,
    responses(
        (status = 200, description = "Usage recorded", body = Subscription),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
        (status = 409, description = "Subscription is cancelled", body = ErrorResponse),
        (status = 422, description = "Tier limit exceeded", body = ErrorResponse),
    )
)]
pub async fn record_usage(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    update: Result<Json<UsageUpdate>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let id = path_id(id)?;
    let Json(update) = update.map_err(|r| rejection_error(r.status(), r.body_text()))?;
    state
        .manager
        .record_usage(id, update, Utc::now())
        .map(Json)
        .map_err(api_error)
}

/// GET /v1/subscriptions/:id/events — Lifecycle event history.
#[utoipa::path(
    get,
    path = "/v1/subscriptions/{id}/events",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Events in emission order", body = [SubscriptionEvent]),
        (status = 404, description = "Subscription not found", body = ErrorResponse),
    )
)]
pub async fn subscription_events(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<SubscriptionEvent>>, ApiError> {
    let id = path_id(id)?;
    state.manager.get(id).map_err(api_error)?;
    Ok(Json(state.events.history(id)))
}

/// POST /v1/subscriptions/process-transitions — Run a transition sweep now.
#[utoipa::path(
    post,
    path = "/v1/subscriptions/process-transitions",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
    )
)]
pub async fn process_all_transitions(
    State(state): State<AppState>,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.manager.sweep(Utc::now()).map_err(api_error)?;
    info!(
        transitioned = report.transitioned,
        failed = report.failures.len(),
        "On-demand transition sweep finished"
    );
    Ok(Json(report))
}

/// GET /v1/pricing/tiers — The pricing catalog.
#[utoipa::path(
    get,
    path = "/v1/pricing/tiers",
    tag = "Pricing",
    responses(
        (status = 200, description = "All pricing tiers", body = TierListResponse),
    )
)]
pub async fn list_tiers(State(state): State<AppState>) -> Json<TierListResponse> {
    Json(TierListResponse {
        tiers: state.manager.catalog().tiers().to_vec(),
    })
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|r| rejection_error(r.status(), r.body_text()))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSubscriptionsQuery {
    pub organization_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TierListResponse {
    pub tiers: Vec<PricingTier>,
}
