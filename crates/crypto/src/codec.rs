//! Relay payload decoding
//!
//! Each poll response carries an AES key wrapped with the session's RSA public
//! key (OAEP, SHA-256 digest and MGF1, no label) and a list of payloads. A
//! payload is base64 of `iv (16) || AES-CFB128 ciphertext || 1 trailing byte`.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use openssl::encrypt::Decrypter;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKeyRef, Private};
use openssl::rsa::Padding;
use openssl::symm::{decrypt, Cipher};
use thiserror::Error;

use oastbeacon_core::InteractionRecord;

/// AES block / IV size
pub const IV_LEN: usize = 16;

/// Bytes the relay appends after each ciphertext. Dropped, not interpreted.
pub const FRAME_TRAILER_LEN: usize = 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Session key unwrap failed: {0}")]
    KeyUnwrap(String),
    #[error("Payload decryption failed: {0}")]
    PayloadDecrypt(String),
    #[error("Interaction {index} is not valid JSON: {reason}")]
    InvalidRecord { index: usize, reason: String },
    #[error("Sealing failed: {0}")]
    Seal(String),
}

/// Symmetric key the relay uses for one poll batch
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({} bytes)", self.0.len())
    }
}

/// Unwrap the relay's base64 RSA-OAEP/SHA-256 wrapped session key
pub fn unwrap_session_key(
    wrapped_b64: &str,
    private_key: &PKeyRef<Private>,
) -> Result<SessionKey, CodecError> {
    let wrapped = STANDARD
        .decode(wrapped_b64.trim())
        .map_err(|e| CodecError::KeyUnwrap(format!("invalid base64: {}", e)))?;

    let unwrap_err = |e: openssl::error::ErrorStack| CodecError::KeyUnwrap(e.to_string());

    let mut decrypter = Decrypter::new(private_key).map_err(unwrap_err)?;
    decrypter.set_rsa_padding(Padding::PKCS1_OAEP).map_err(unwrap_err)?;
    decrypter.set_rsa_oaep_md(MessageDigest::sha256()).map_err(unwrap_err)?;
    decrypter.set_rsa_mgf1_md(MessageDigest::sha256()).map_err(unwrap_err)?;

    let len = decrypter.decrypt_len(&wrapped).map_err(unwrap_err)?;
    let mut key = vec![0u8; len];
    let written = decrypter.decrypt(&wrapped, &mut key).map_err(unwrap_err)?;
    key.truncate(written);

    Ok(SessionKey(key))
}

/// AES-CFB128 variant for a key of `len` bytes
pub(crate) fn cfb_cipher(len: usize) -> Option<Cipher> {
    match len {
        16 => Some(Cipher::aes_128_cfb128()),
        24 => Some(Cipher::aes_192_cfb128()),
        32 => Some(Cipher::aes_256_cfb128()),
        _ => None,
    }
}

/// Decrypt one base64 payload to its UTF-8 plaintext
pub fn decrypt_record(payload_b64: &str, key: &SessionKey) -> Result<String, CodecError> {
    let frame = STANDARD
        .decode(payload_b64.trim())
        .map_err(|e| CodecError::PayloadDecrypt(format!("invalid base64: {}", e)))?;

    if frame.len() < IV_LEN {
        return Err(CodecError::PayloadDecrypt(format!(
            "payload is {} bytes, shorter than the {}-byte IV",
            frame.len(),
            IV_LEN
        )));
    }

    let (iv, rest) = frame.split_at(IV_LEN);
    let ciphertext = &rest[..rest.len().saturating_sub(FRAME_TRAILER_LEN)];

    let cipher = cfb_cipher(key.len()).ok_or_else(|| {
        CodecError::PayloadDecrypt(format!("unsupported session key length {}", key.len()))
    })?;

    let plaintext = decrypt(cipher, key.as_bytes(), Some(iv), ciphertext)
        .map_err(|e| CodecError::PayloadDecrypt(e.to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| CodecError::PayloadDecrypt(format!("plaintext is not UTF-8: {}", e)))
}

/// Decrypt and parse a poll batch in order.
///
/// The first payload that fails to decrypt or parse aborts the whole batch.
pub fn decrypt_interactions<S: AsRef<str>>(
    key: &SessionKey,
    payloads: &[S],
) -> Result<Vec<InteractionRecord>, CodecError> {
    payloads
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            let plaintext = decrypt_record(payload.as_ref(), key)?;
            InteractionRecord::from_json(&plaintext).map_err(|e| CodecError::InvalidRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}
