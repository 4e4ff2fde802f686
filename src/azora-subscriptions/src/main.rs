//! Azora Subscriptions, the subscription lifecycle service.
//!
//! Main entry point that loads the pricing catalog, wires the manager to its
//! store and event sinks, and starts the server and the transition sweep.

use azora_api::{ApiServer, AppState};
use azora_billing::{InMemorySubscriptionStore, PricingCatalog, SubscriptionManager};
use azora_core::config::AppConfig;
use azora_core::event_bus::{EventLog, EventSink, FanoutSink, TracingSink};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "azora-subscriptions")]
#[command(about = "Subscription lifecycle service: trial, promotional and full-price phases")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "AZORA__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "AZORA__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// JSON pricing catalog (overrides config)
    #[arg(long, env = "AZORA__BILLING__CATALOG_PATH")]
    catalog: Option<String>,

    /// Seconds between transition sweeps, 0 disables (overrides config)
    #[arg(long, env = "AZORA__BILLING__SWEEP_INTERVAL_SECS")]
    sweep_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azora_subscriptions=info,azora_billing=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Azora Subscriptions starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(path) = cli.catalog {
        config.billing.catalog_path = Some(path);
    }
    if let Some(secs) = cli.sweep_interval {
        config.billing.sweep_interval_secs = secs;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        sweep_interval_secs = config.billing.sweep_interval_secs,
        "Configuration loaded"
    );

    // A configured catalog that fails to load is fatal.
    let catalog = match &config.billing.catalog_path {
        Some(path) => PricingCatalog::from_json_file(path)?,
        None => {
            info!("Using built-in pricing catalog");
            PricingCatalog::builtin()
        }
    };

    let event_log = Arc::new(EventLog::new());
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingSink), event_log.clone()];
    let manager = Arc::new(SubscriptionManager::new(
        Arc::new(catalog),
        Arc::new(InMemorySubscriptionStore::new()),
        Arc::new(FanoutSink::new(sinks)),
        &config.billing,
    ));

    // Start API server
    let state = AppState::new(manager.clone(), event_log, config.node_id.clone());
    let api_server = ApiServer::new(config.clone(), state);

    // Start metrics exporter
    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    // Spawn transition sweep task
    if config.billing.sweep_interval_secs > 0 {
        let sweeper = manager.clone();
        let period = Duration::from_secs(config.billing.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = sweeper.sweep(chrono::Utc::now()) {
                    error!(error = %e, "Transition sweep failed");
                }
            }
        });
    } else {
        info!("Transition sweep disabled; transitions run on request only");
    }

    info!("Azora Subscriptions is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
