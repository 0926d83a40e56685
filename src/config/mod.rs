mod client;
mod settings;

pub use client::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_EVENT_CAPACITY};
pub use settings::{DeliveryConfig, ProxyConfig, Settings, TelemetryConfig};
