use std::time::Duration;

use crate::queue::RetryConfig;

/// Default collection endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.duckt.dev";

/// Default capacity of the delivery event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Construction-time configuration for [`crate::DucktClient`].
///
/// Credentials and endpoint are not validated; a bad value only shows up as
/// failed deliveries.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Sent as `X-Proxy-ID`
    pub proxy_id: String,
    /// Sent as `X-Proxy-Secret`
    pub proxy_secret: String,
    /// Base URL, records are posted to `{endpoint}/requests`
    pub endpoint: String,
    pub retry: RetryConfig,
    /// Bound on a single HTTP attempt. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Treat non-2xx responses as failed deliveries
    pub retry_on_error_status: bool,
    /// Buffer size of the delivery event broadcast
    pub event_capacity: usize,
}

impl ClientConfig {
    pub fn new(proxy_id: impl Into<String>, proxy_secret: impl Into<String>) -> Self {
        Self {
            proxy_id: proxy_id.into(),
            proxy_secret: proxy_secret.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryConfig::default(),
            request_timeout: None,
            retry_on_error_status: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_retry_on_error_status(mut self, enabled: bool) -> Self {
        self.retry_on_error_status = enabled;
        self
    }

    /// Full URL records are posted to
    pub fn requests_url(&self) -> String {
        format!("{}/requests", self.endpoint.trim_end_matches('/'))
    }
}
