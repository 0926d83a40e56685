use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::client::{ClientConfig, DEFAULT_ENDPOINT};
use crate::queue::RetryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub jitter_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Per-request timeout in seconds, unset means no timeout
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub retry_on_error_status: bool,
    /// How long the forwarder waits for outstanding records on exit
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Export traces over OTLP
    #[serde(default)]
    pub otel_enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "duckt-forward".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("delivery.endpoint", DEFAULT_ENDPOINT)?
            .set_default("delivery.retry_delay_ms", default_retry_delay_ms())?
            .set_default("delivery.max_retries", default_max_retries())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // DUCKT_PROXY__ID, DUCKT_PROXY__SECRET, DUCKT_DELIVERY__ENDPOINT, ...
            .add_source(
                Environment::with_prefix("DUCKT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Build the library configuration from the loaded settings
    pub fn client_config(&self) -> ClientConfig {
        let delivery = &self.delivery;
        let mut config = ClientConfig::new(self.proxy.id.clone(), self.proxy.secret.clone())
            .with_endpoint(delivery.endpoint.clone())
            .with_retry(RetryConfig {
                retry_delay_ms: delivery.retry_delay_ms,
                max_retries: delivery.max_retries,
                jitter_factor: delivery.jitter_factor,
                max_delay_ms: delivery.max_delay_ms,
            })
            .with_retry_on_error_status(delivery.retry_on_error_status);

        if let Some(secs) = delivery.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.shutdown_timeout_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            jitter_factor: 0.0,
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: None,
            retry_on_error_status: true,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otel_enabled: false,
            otel_endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(delivery: DeliveryConfig) -> Settings {
        Settings {
            proxy: ProxyConfig {
                id: "abc123".to_string(),
                secret: "secret123".to_string(),
            },
            delivery,
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_default_values() {
        let delivery = DeliveryConfig::default();
        assert_eq!(delivery.endpoint, "https://api.duckt.dev");
        assert_eq!(delivery.retry_delay_ms, 1000);
        assert_eq!(delivery.max_retries, 3);
        assert_eq!(delivery.shutdown_timeout_secs, 30);

        let telemetry = TelemetryConfig::default();
        assert!(!telemetry.otel_enabled);
        assert_eq!(telemetry.service_name, "duckt-forward");
    }

    #[test]
    fn test_client_config_conversion() {
        let settings = settings_with(DeliveryConfig {
            endpoint: "http://collector.local".to_string(),
            max_retries: 5,
            request_timeout_secs: Some(10),
            retry_on_error_status: false,
            ..Default::default()
        });

        let config = settings.client_config();
        assert_eq!(config.proxy_id, "abc123");
        assert_eq!(config.proxy_secret, "secret123");
        assert_eq!(config.requests_url(), "http://collector.local/requests");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(10)));
        assert!(!config.retry_on_error_status);
    }

    #[test]
    fn test_deserialize_minimal() {
        let settings: Settings = Config::builder()
            .set_override("proxy.id", "abc123")
            .unwrap()
            .set_override("proxy.secret", "secret123")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.proxy.id, "abc123");
        assert_eq!(settings.delivery.endpoint, "https://api.duckt.dev");
        assert!(!settings.telemetry.json_logs);
    }
}
