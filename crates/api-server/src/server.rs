//! API server: HTTP router, listener and the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::subscription_rest as subs;
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use azora_core::config::AppConfig;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Subscriptions
        .route(
            "/v1/subscriptions",
            get(subs::list_subscriptions).post(subs::create_subscription),
        )
        .route(
            "/v1/subscriptions/process-transitions",
            post(subs::process_all_transitions),
        )
        .route("/v1/subscriptions/:id", get(subs::get_subscription))
        .route(
            "/v1/subscriptions/:id/process-transition",
            post(subs::process_transition),
        )
        .route("/v1/subscriptions/:id/cancel", post(subs::cancel_subscription))
        .route(
            "/v1/subscriptions/:id/check-notifications",
            get(subs::check_notifications),
        )
        .route("/v1/subscriptions/:id/usage", post(subs::record_usage))
        .route("/v1/subscriptions/:id/events", get(subs::subscription_events))
        // Pricing
        .route("/v1/pricing/tiers", get(subs::list_tiers))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // API docs
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
