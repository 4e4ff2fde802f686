use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `AZORA__` and an optional `azora.toml` config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// JSON pricing catalog; the built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
    /// Seconds between transition sweeps; 0 disables the sweep task.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_trial_notice_days")]
    pub trial_notice_days: i64,
    #[serde(default = "default_promo_notice_days")]
    pub promo_notice_days: i64,
    /// Compare-and-swap attempts per mutation before reporting a conflict.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_sweep_interval_secs() -> u64 {
    3600
}
fn default_trial_notice_days() -> i64 {
    3
}
fn default_promo_notice_days() -> i64 {
    7
}
fn default_max_write_retries() -> u32 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            sweep_interval_secs: default_sweep_interval_secs(),
            trial_notice_days: default_trial_notice_days(),
            promo_notice_days: default_promo_notice_days(),
            max_write_retries: default_max_write_retries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            billing: BillingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("azora").required(false))
            .add_source(
                config::Environment::with_prefix("AZORA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.billing.trial_notice_days, 3);
        assert_eq!(config.billing.promo_notice_days, 7);
        assert!(config.billing.catalog_path.is_none());
        assert!(config.billing.max_write_retries > 0);
    }

    #[test]
    fn test_partial_source_fills_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("billing.sweep_interval_secs", 60)
            .unwrap()
            .set_override("api.http_port", 3000)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.billing.sweep_interval_secs, 60);
        assert_eq!(config.api.http_port, 3000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.billing.promo_notice_days, 7);
        assert_eq!(config.node_id, "node-01");
    }
}
