//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Azora Subscriptions API",
        version = "0.1.0",
        description = "Subscription lifecycle service.\n\nEvery subscription starts with a free trial, moves to promotional pricing and then to full price. Phases are derived from time and materialized by idempotent transition processing.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Subscriptions", description = "Create, inspect, transition and cancel subscriptions"),
        (name = "Pricing", description = "Pricing catalog"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Subscriptions
        crate::subscription_rest::create_subscription,
        crate::subscription_rest::list_subscriptions,
        crate::subscription_rest::get_subscription,
        crate::subscription_rest::process_transition,
        crate::subscription_rest::cancel_subscription,
        crate::subscription_rest::check_notifications,
        crate::subscription_rest::record_usage,
        crate::subscription_rest::subscription_events,
        crate::subscription_rest::process_all_transitions,
        // Pricing
        crate::subscription_rest::list_tiers,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Domain types
        azora_core::types::Currency,
        azora_core::types::TierFamily,
        azora_core::types::PricingTier,
        azora_core::types::BillingInterval,
        azora_core::types::SubscriptionStatus,
        azora_core::types::Phase,
        azora_core::types::Subscription,
        azora_core::types::CreateSubscriptionRequest,
        azora_core::types::UsageUpdate,
        azora_core::types::SubscriptionEventType,
        azora_core::types::SubscriptionEvent,
        // Billing read models
        azora_billing::SubscriptionView,
        azora_billing::TransitionOutcome,
        azora_billing::SweepReport,
        azora_billing::SweepFailure,
        azora_billing::NotificationDecision,
        // REST request/response types
        crate::subscription_rest::CancelRequest,
        crate::subscription_rest::TierListResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
