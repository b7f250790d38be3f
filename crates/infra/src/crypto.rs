//! Secret protection consumed by command handlers.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use warden_core::{CryptoType, CryptoValue};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("secret crypto failed: {0}")]
pub struct CryptoError(pub String);

/// Protects a plaintext secret before it is written into an event.
///
/// The core treats the result as opaque; a failure aborts the command and is
/// returned to the caller unchanged.
#[async_trait]
pub trait SecretCrypto: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, CryptoError>;
}

/// Placeholder `SecretCrypto` until an encrypting implementation backed by a
/// key service exists.
///
/// Secrets are hashed one-way with SHA-256: a stored client secret can be
/// verified but never recovered, so it cannot be presented to the IDP.
/// `key_id` is recorded on the value only; it does not affect the digest.
#[derive(Debug, Clone)]
pub struct Sha256SecretHasher {
    key_id: String,
}

impl Sha256SecretHasher {
    pub const ALGORITHM: &'static str = "sha256";

    pub fn new(key_id: impl Into<String>) -> Self {
        Self { key_id: key_id.into() }
    }

    pub fn verify(&self, plaintext: &[u8], value: &CryptoValue) -> bool {
        value.crypto_type == CryptoType::Hash
            && value.algorithm == Self::ALGORITHM
            && value.crypted == digest(plaintext)
    }
}

impl Default for Sha256SecretHasher {
    fn default() -> Self {
        Self::new("default")
    }
}

fn digest(plaintext: &[u8]) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(plaintext);
    hex::encode(h.finalize()).into_bytes()
}

#[async_trait]
impl SecretCrypto for Sha256SecretHasher {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<CryptoValue, CryptoError> {
        Ok(CryptoValue {
            crypto_type: CryptoType::Hash,
            algorithm: Self::ALGORITHM.to_string(),
            key_id: self.key_id.clone(),
            crypted: digest(plaintext),
        })
    }
}
