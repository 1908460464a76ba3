//! Relay-side framing
//!
//! Inverse of [`crate::codec`]: wrap a session key for a client's public key
//! and seal interaction payloads the way a relay does. Used to drive local
//! relay stubs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use openssl::encrypt::Encrypter;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Padding;
use openssl::symm::encrypt;

use crate::codec::{cfb_cipher, CodecError, SessionKey, IV_LEN};

/// Value written into the trailing framing byte
pub const FRAME_TRAILER: u8 = 0;

/// Wrap `key` for the holder of `public_key_pem` (RSA-OAEP, SHA-256), base64
pub fn wrap_session_key(public_key_pem: &str, key: &[u8]) -> Result<String, CodecError> {
    let seal_err = |e: openssl::error::ErrorStack| CodecError::Seal(e.to_string());

    let public = PKey::public_key_from_pem(public_key_pem.as_bytes()).map_err(seal_err)?;
    let mut encrypter = Encrypter::new(&public).map_err(seal_err)?;
    encrypter.set_rsa_padding(Padding::PKCS1_OAEP).map_err(seal_err)?;
    encrypter.set_rsa_oaep_md(MessageDigest::sha256()).map_err(seal_err)?;
    encrypter.set_rsa_mgf1_md(MessageDigest::sha256()).map_err(seal_err)?;

    let len = encrypter.encrypt_len(key).map_err(seal_err)?;
    let mut wrapped = vec![0u8; len];
    let written = encrypter.encrypt(key, &mut wrapped).map_err(seal_err)?;
    wrapped.truncate(written);

    Ok(STANDARD.encode(wrapped))
}

/// Seal a payload under a random IV
pub fn seal_record(key: &SessionKey, plaintext: &[u8]) -> Result<String, CodecError> {
    let mut iv = [0u8; IV_LEN];
    openssl::rand::rand_bytes(&mut iv).map_err(|e| CodecError::Seal(e.to_string()))?;
    seal_record_with_iv(key, &iv, plaintext)
}

/// Seal a payload as `base64(iv || AES-CFB128(plaintext) || trailer)`
pub fn seal_record_with_iv(
    key: &SessionKey,
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<String, CodecError> {
    let cipher = cfb_cipher(key.len())
        .ok_or_else(|| CodecError::Seal(format!("unsupported session key length {}", key.len())))?;
    let ciphertext = encrypt(cipher, key.as_bytes(), Some(iv), plaintext)
        .map_err(|e| CodecError::Seal(e.to_string()))?;

    let mut frame = Vec::with_capacity(IV_LEN + ciphertext.len() + 1);
    frame.extend_from_slice(iv);
    frame.extend_from_slice(&ciphertext);
    frame.push(FRAME_TRAILER);

    Ok(STANDARD.encode(frame))
}
