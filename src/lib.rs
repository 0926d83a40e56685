//! Non-blocking forwarding of captured HTTP transactions to a Duckt
//! collection endpoint.

// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Delivery pipeline
pub mod client;
pub mod events;
pub mod queue;
pub mod transport;

pub use client::DucktClient;
pub use config::ClientConfig;
pub use error::{DucktError, Result};
pub use events::DeliveryEvent;
pub use queue::{QueueStats, Record, RetryConfig, TransactionRecord};
pub use transport::{HttpTransport, Transport};
