//! Delivery transport abstraction.
//!
//! The drain worker hands every payload to a [`Transport`]. The production
//! implementation is [`HttpTransport`]; tests and embedders can plug in their
//! own.

mod http;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

pub use http::{HttpTransport, PROXY_ID_HEADER, PROXY_SECRET_HEADER};

/// Sends one stamped payload to the collector.
///
/// An `Err` counts as a failed attempt and is subject to retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, payload: &Map<String, Value>) -> Result<()>;
}
