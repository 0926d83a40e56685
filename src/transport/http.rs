//! HTTP delivery to the collection endpoint.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{Map, Value};

use super::Transport;
use crate::config::ClientConfig;
use crate::error::{DucktError, Result};

pub const PROXY_ID_HEADER: &str = "X-Proxy-ID";
pub const PROXY_SECRET_HEADER: &str = "X-Proxy-Secret";

/// Posts payloads to `{endpoint}/requests` with the proxy credentials.
pub struct HttpTransport {
    client: Client,
    url: String,
    proxy_id: String,
    proxy_secret: String,
    retry_on_error_status: bool,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: config.requests_url(),
            proxy_id: config.proxy_id.clone(),
            proxy_secret: config.proxy_secret.clone(),
            retry_on_error_status: config.retry_on_error_status,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, payload: &Map<String, Value>) -> Result<()> {
        tracing::trace!(url = %self.url, "Posting record");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(PROXY_ID_HEADER, &self.proxy_id)
            .header(PROXY_SECRET_HEADER, &self.proxy_secret)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if self.retry_on_error_status && !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DucktError::Status { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_uses_requests_url() {
        let config = ClientConfig::new("abc123", "secret123").with_endpoint("http://127.0.0.1:9/");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url(), "http://127.0.0.1:9/requests");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_delivery_failure() {
        // Port 9 (discard) is not listening on loopback in test environments
        let config = ClientConfig::new("abc123", "secret123").with_endpoint("http://127.0.0.1:9");
        let transport = HttpTransport::new(&config).unwrap();

        let err = tokio_test::assert_err!(transport.deliver(&Map::new()).await);
        assert!(err.is_delivery_failure());
    }
}
