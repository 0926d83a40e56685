//! Public client facade.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::{DeliveryEvent, EventSink};
use crate::queue::{DeliveryQueue, ExponentialBackoff, QueueStats, Record};
use crate::transport::{HttpTransport, Transport};

/// Forwards captured HTTP transactions to the collection endpoint.
///
/// `send_request` only queues the record; delivery happens on a background
/// task with bounded retry and exponential backoff. Delivery failures are
/// never reported back to the caller, use [`DucktClient::subscribe`] to
/// observe them.
///
/// # Example
///
/// ```rust,ignore
/// let client = DucktClient::new(ClientConfig::new("abc123", "secret123"))?;
///
/// client.send_request(TransactionRecord {
///     uri: Some("/api/users".into()),
///     method: Some("GET".into()),
///     status_code: Some(200),
///     ..Default::default()
/// });
/// ```
pub struct DucktClient {
    config: ClientConfig,
    queue: DeliveryQueue,
}

impl DucktClient {
    /// Create a client that posts over HTTP. Must be called from within a
    /// Tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client with a custom transport. Only the retry and event
    /// settings of `config` apply; credentials and endpoint are the
    /// transport's business.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let backoff = ExponentialBackoff::new(config.retry.clone());
        let events = EventSink::new(config.event_capacity);
        let queue = DeliveryQueue::spawn(transport, backoff, events)?;

        tracing::info!(
            endpoint = %config.endpoint,
            max_retries = config.retry.max_retries,
            "Duckt client initialized"
        );

        Ok(Self { config, queue })
    }

    /// Queue a record for delivery. Always returns `true`; the caller is
    /// never told whether delivery eventually succeeded.
    pub fn send_request(&self, record: impl Into<Record>) -> bool {
        self.queue.enqueue(record.into());
        true
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Observe deliveries, retries and drops
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.queue.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Records not yet delivered or dropped
    pub fn outstanding(&self) -> usize {
        self.queue.outstanding()
    }

    /// Wait for the queue to settle. Returns false on timeout.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.queue.flush(timeout).await
    }

    /// Flush, then stop the background worker.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.queue.shutdown(timeout).await
    }
}
