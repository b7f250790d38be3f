//! Opaque output of the secret crypto service.

use serde::{Deserialize, Serialize};

/// How a secret was protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoType {
    /// Reversible encryption; `key_id` names the key to decrypt with.
    Encryption,
    /// One-way hash; can only be verified, never recovered.
    Hash,
}

/// Ciphertext (or digest) plus the metadata needed to interpret it later.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoValue {
    pub crypto_type: CryptoType,
    pub algorithm: String,
    pub key_id: String,
    pub crypted: Vec<u8>,
}

// Never print secret material, not even protected.
impl core::fmt::Debug for CryptoValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CryptoValue")
            .field("crypto_type", &self.crypto_type)
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("crypted", &format_args!("<{} bytes>", self.crypted.len()))
            .finish()
    }
}
