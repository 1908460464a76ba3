//! Decrypted interaction records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One interaction reported by the relay (a DNS lookup, HTTP hit, SMTP
/// session, ...).
///
/// The payload is opaque JSON; the accessors only read fields relays commonly
/// include and return `None` when they are missing or of another type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionRecord(Value);

impl InteractionRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a decrypted payload
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// `dns`, `http`, `smtp`, ...
    pub fn protocol(&self) -> Option<&str> {
        self.str_field("protocol")
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.str_field("unique-id")
    }

    pub fn full_id(&self) -> Option<&str> {
        self.str_field("full-id")
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.str_field("remote-address")
    }

    /// Relay-side timestamp, as sent (usually RFC 3339)
    pub fn timestamp(&self) -> Option<&str> {
        self.str_field("timestamp")
    }
}

impl From<Value> for InteractionRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let record = InteractionRecord::from_json(
            r#"{"protocol":"dns","unique-id":"abc","full-id":"abc.x","remote-address":"10.0.0.1","timestamp":"2024-01-01T00:00:00Z","q-type":"A"}"#,
        )
        .unwrap();

        assert_eq!(record.protocol(), Some("dns"));
        assert_eq!(record.unique_id(), Some("abc"));
        assert_eq!(record.full_id(), Some("abc.x"));
        assert_eq!(record.remote_address(), Some("10.0.0.1"));
        assert_eq!(record.timestamp(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.as_value()["q-type"], "A");
    }

    #[test]
    fn test_opaque_payloads() {
        let record = InteractionRecord::new(json!([1, 2, 3]));
        assert_eq!(record.protocol(), None);

        let record = InteractionRecord::new(json!({"protocol": 7}));
        assert_eq!(record.protocol(), None);
    }

    #[test]
    fn test_serializes_transparently() {
        let value = json!({"protocol": "http", "raw-request": "GET / HTTP/1.1"});
        let record = InteractionRecord::from(value.clone());
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(InteractionRecord::from_json("not json").is_err());
    }
}
