use std::fmt;

use openssl::bn::BigNum;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use thiserror::Error;
use tracing::debug;

/// RSA modulus size for session keypairs
pub const RSA_KEY_BITS: u32 = 2048;

/// RSA public exponent (F4)
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Keypair not initialized")]
    NotInitialized,
    #[error("Key generation failed: {0}")]
    Generation(ErrorStack),
    #[error("Public key export failed: {0}")]
    Export(ErrorStack),
}

/// RSA keypair for one relay session.
///
/// The private half never leaves this struct except as a borrow.
pub struct SessionKeypair {
    private: PKey<Private>,
}

impl SessionKeypair {
    /// Generate a new 2048-bit keypair with e = 65537
    pub fn generate() -> Result<Self, KeyError> {
        let exponent = BigNum::from_u32(RSA_PUBLIC_EXPONENT).map_err(KeyError::Generation)?;
        let rsa = Rsa::generate_with_e(RSA_KEY_BITS, &exponent).map_err(KeyError::Generation)?;
        let private = PKey::from_rsa(rsa).map_err(KeyError::Generation)?;
        Ok(Self { private })
    }

    /// Public key as PEM-encoded SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`)
    pub fn public_key_pem(&self) -> Result<String, KeyError> {
        let pem = self.private.public_key_to_pem().map_err(KeyError::Export)?;
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }

    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private
    }
}

impl fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeypair")
            .field("bits", &self.private.bits())
            .finish_non_exhaustive()
    }
}

/// Holds a session's keypair, generated at most once.
#[derive(Debug, Default)]
pub struct KeyManager {
    keypair: Option<SessionKeypair>,
}

impl KeyManager {
    /// Empty manager; call [`KeyManager::generate_keypair`] before use
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the keypair unless one already exists.
    ///
    /// Returns `true` if keys were generated by this call. Existing keys are
    /// never replaced; a new keypair means a new session.
    pub fn generate_keypair(&mut self) -> Result<bool, KeyError> {
        if self.keypair.is_some() {
            return Ok(false);
        }
        let keypair = SessionKeypair::generate()?;
        debug!("Generated {}-bit session keypair", RSA_KEY_BITS);
        self.keypair = Some(keypair);
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.keypair.is_some()
    }

    /// Public key as PEM SubjectPublicKeyInfo
    pub fn export_public_key(&self) -> Result<String, KeyError> {
        self.keypair()?.public_key_pem()
    }

    /// Private key for unwrapping relay session keys
    pub fn private_key(&self) -> Result<&PKeyRef<Private>, KeyError> {
        Ok(self.keypair()?.private_key())
    }

    fn keypair(&self) -> Result<&SessionKeypair, KeyError> {
        self.keypair.as_ref().ok_or(KeyError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_before_generation_fails() {
        let keys = KeyManager::new();
        assert!(!keys.is_initialized());
        assert!(matches!(keys.export_public_key(), Err(KeyError::NotInitialized)));
        assert!(matches!(keys.private_key(), Err(KeyError::NotInitialized)));
    }

    #[test]
    fn test_generate_then_export_parses() {
        let mut keys = KeyManager::new();
        assert!(keys.generate_keypair().unwrap());

        let pem = keys.export_public_key().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let public = PKey::public_key_from_pem(pem.as_bytes()).unwrap();
        let rsa = public.rsa().unwrap();
        assert_eq!(rsa.n().num_bits(), RSA_KEY_BITS as i32);
        assert_eq!(rsa.e().to_dec_str().unwrap().to_string(), "65537");
    }

    #[test]
    fn test_generation_is_idempotent() {
        let mut keys = KeyManager::new();
        assert!(keys.generate_keypair().unwrap());
        let first = keys.export_public_key().unwrap();

        assert!(!keys.generate_keypair().unwrap());
        assert_eq!(keys.export_public_key().unwrap(), first);
    }

    #[test]
    fn test_distinct_managers_distinct_keys() {
        let a = SessionKeypair::generate().unwrap();
        let b = SessionKeypair::generate().unwrap();
        assert_ne!(a.public_key_pem().unwrap(), b.public_key_pem().unwrap());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let keypair = SessionKeypair::generate().unwrap();
        let debug = format!("{:?}", keypair);
        assert!(debug.contains("2048"));
        assert!(!debug.contains("PRIVATE"));
    }
}
