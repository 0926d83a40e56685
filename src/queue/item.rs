//! Queue item and record types.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Tag injected into every payload unless the caller supplies one
pub const SDK_TYPE: &str = "sdk";

/// A captured HTTP transaction, as handed to [`crate::DucktClient::send_request`].
///
/// Every field is optional and passed through as-is; nothing is validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    /// Any additional fields, flattened into the body
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Opaque caller record: a JSON object whose fields are forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Build a record from an arbitrary JSON value. Returns `None` unless the
    /// value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<TransactionRecord> for Record {
    fn from(record: TransactionRecord) -> Self {
        // A struct of strings and maps always serializes to an object
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

/// An item waiting in the delivery queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Local identifier for logs and events, never sent
    pub id: Uuid,
    /// Body posted to the collector
    pub payload: Map<String, Value>,
    /// Failed delivery attempts so far
    pub attempt_count: u32,
}

impl QueueItem {
    /// Stamp a record with the `type` tag and `created_at` timestamp.
    ///
    /// A caller-supplied `type` wins over the default tag; `created_at` is
    /// always set here.
    pub fn new(record: Record) -> Self {
        let mut payload = Map::with_capacity(record.0.len() + 2);
        payload.insert("type".to_string(), Value::from(SDK_TYPE));
        payload.extend(record.0);
        payload.insert(
            "created_at".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        Self {
            id: Uuid::new_v4(),
            payload,
            attempt_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn test_injects_type_and_created_at() {
        let record = Record::new().field("uri", "/x").field("method", "GET");
        let item = QueueItem::new(record);

        assert_eq!(item.attempt_count, 0);
        assert_eq!(item.payload.len(), 4);
        assert_eq!(item.payload["uri"], json!("/x"));
        assert_eq!(item.payload["method"], json!("GET"));
        assert_eq!(item.payload["type"], json!("sdk"));

        let created_at = item.payload["created_at"].as_str().unwrap();
        assert!(created_at.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(created_at).is_ok());
    }

    #[test]
    fn test_caller_type_overrides_default() {
        let item = QueueItem::new(Record::new().field("type", "custom"));
        assert_eq!(item.payload["type"], json!("custom"));
    }

    #[test]
    fn test_created_at_is_always_stamped() {
        let item = QueueItem::new(Record::new().field("created_at", "yesterday"));
        assert_ne!(item.payload["created_at"], json!("yesterday"));
    }

    #[test]
    fn test_transaction_record_omits_missing_fields() {
        let record = TransactionRecord {
            uri: Some("/api/users".to_string()),
            status_code: Some(200),
            ..Default::default()
        };

        let map = Record::from(record).into_inner();
        assert_eq!(map.len(), 2);
        assert_eq!(map["uri"], json!("/api/users"));
        assert_eq!(map["status_code"], json!(200));
    }

    #[test]
    fn test_transaction_record_flattens_extra() {
        let mut extra = Map::new();
        extra.insert("trace_id".to_string(), json!("t-1"));
        let record = TransactionRecord {
            method: Some("POST".to_string()),
            extra,
            ..Default::default()
        };

        let map = Record::from(record).into_inner();
        assert_eq!(map["trace_id"], json!("t-1"));
        assert_eq!(map["method"], json!("POST"));
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(Record::from_value(json!({"uri": "/x"})).is_some());
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("text")).is_none());
    }
}
