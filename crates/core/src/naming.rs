//! Correlation identifiers and callback-domain derivation

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random bytes behind a correlation id (rendered as 32 hex chars)
pub const CORRELATION_ID_BYTES: usize = 16;

/// Label length some relays expect (20-char correlation id + 13-char nonce)
pub const RELAY_LABEL_LEN: usize = 33;

/// Generate a fresh correlation id: 128 random bits as lowercase hex.
///
/// The id appears in every DNS/HTTP hit against the callback domain, so it is
/// public. Never derive anything secret from it.
pub fn generate_correlation_id() -> String {
    let mut bytes = [0u8; CORRELATION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate the secret token that authenticates poll/deregister calls.
///
/// Drawn independently of the correlation id (UUID v4).
pub fn generate_secret_token() -> String {
    Uuid::new_v4().to_string()
}

/// Build the callback domain `<correlation_id>.<host>`.
///
/// Returns an empty string when no correlation id is set. No length checks.
pub fn derive_domain(correlation_id: &str, host: &str) -> String {
    if correlation_id.is_empty() {
        return String::new();
    }
    format!("{}.{}", correlation_id, host)
}

/// Minimum subdomain-label policy for a relay.
///
/// Some relays only route labels of a fixed minimum length. When `pad_to` is
/// set, the correlation id is extended with random lowercase letters up to
/// that many characters before the host is appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPolicy {
    #[serde(default)]
    pub pad_to: Option<usize>,
}

impl DomainPolicy {
    /// Append the raw correlation id
    pub fn unpadded() -> Self {
        Self { pad_to: None }
    }

    /// Pad the label to `len` characters
    pub fn padded_to(len: usize) -> Self {
        Self { pad_to: Some(len) }
    }

    /// Draw the padding suffix for a correlation id.
    ///
    /// Empty when the policy is unpadded or the id already meets the length.
    pub fn padding_for(&self, correlation_id: &str) -> String {
        let Some(target) = self.pad_to else {
            return String::new();
        };
        let missing = target.saturating_sub(correlation_id.len());
        (0..missing)
            .map(|_| char::from(OsRng.gen_range(b'a'..=b'z')))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_shape() {
        let id = generate_correlation_id();
        assert_eq!(id.len(), CORRELATION_ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_correlation_ids_unique() {
        let a = generate_correlation_id();
        let b = generate_correlation_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_token_independent_of_correlation_id() {
        let id = generate_correlation_id();
        let secret = generate_secret_token();

        assert!(Uuid::parse_str(&secret).is_ok());
        assert!(!secret.replace('-', "").contains(&id));
        assert_ne!(generate_secret_token(), secret);
    }

    #[test]
    fn test_derive_domain_keeps_id_unmodified() {
        for _ in 0..16 {
            let id = generate_correlation_id();
            let domain = derive_domain(&id, "oast.fun");
            assert_eq!(domain, format!("{}.oast.fun", id));
            assert!(domain.starts_with(&id));
        }
    }

    #[test]
    fn test_derive_domain_empty_id() {
        assert_eq!(derive_domain("", "oast.fun"), "");
    }

    #[test]
    fn test_derive_domain_no_length_validation() {
        assert_eq!(derive_domain("abc", "relay.test"), "abc.relay.test");
    }

    #[test]
    fn test_unpadded_policy_adds_nothing() {
        let policy = DomainPolicy::default();
        assert_eq!(policy, DomainPolicy::unpadded());
        assert_eq!(policy.padding_for("abc"), "");
    }

    #[test]
    fn test_padded_policy_reaches_target_length() {
        let policy = DomainPolicy::padded_to(RELAY_LABEL_LEN);
        let id = "abcdefghijklmnopqrst";
        let padding = policy.padding_for(id);

        assert_eq!(id.len() + padding.len(), RELAY_LABEL_LEN);
        assert!(padding.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_padded_policy_never_truncates() {
        let policy = DomainPolicy::padded_to(10);
        let id = generate_correlation_id();
        assert_eq!(policy.padding_for(&id), "");
    }

    #[test]
    fn test_policy_serde_default() {
        let policy: DomainPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.pad_to, None);

        let policy: DomainPolicy = serde_json::from_str(r#"{"pad_to":33}"#).unwrap();
        assert_eq!(policy.pad_to, Some(33));
    }
}
