//! Relay wire types

use serde::{Deserialize, Serialize};

/// `POST /register` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "public-key")]
    pub public_key: String,
    #[serde(rename = "secret-key")]
    pub secret_key: String,
    #[serde(rename = "correlation-id")]
    pub correlation_id: String,
}

/// `POST /deregister` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterRequest {
    #[serde(rename = "correlation-id")]
    pub correlation_id: String,
    #[serde(rename = "secret-key")]
    pub secret_key: String,
}

/// `GET /poll` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollResponse {
    /// Base64 RSA-OAEP wrapped AES key for this batch
    #[serde(default)]
    pub aes_key: Option<String>,
    /// Base64 encrypted interactions, oldest first
    #[serde(default)]
    pub data: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_field_names() {
        let request = RegisterRequest {
            public_key: "PEM".into(),
            secret_key: "secret".into(),
            correlation_id: "cid".into(),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["public-key"], "PEM");
        assert_eq!(value["secret-key"], "secret");
        assert_eq!(value["correlation-id"], "cid");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_deregister_field_names() {
        let request = DeregisterRequest {
            correlation_id: "cid".into(),
            secret_key: "secret".into(),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["correlation-id"], "cid");
        assert_eq!(value["secret-key"], "secret");
    }

    #[test]
    fn test_poll_response_tolerates_missing_fields() {
        let empty: PollResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.aes_key.is_none());
        assert!(empty.data.is_none());

        let null_data: PollResponse =
            serde_json::from_str(r#"{"aes_key":"abc","data":null,"extra":[]}"#).unwrap();
        assert_eq!(null_data.aes_key.as_deref(), Some("abc"));
        assert!(null_data.data.is_none());
    }
}
