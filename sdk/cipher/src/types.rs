use std::fmt;

use thiserror::Error;

/// Size of one encrypted field: 16 bytes of ciphertext + 16 byte tag
pub const ENCRYPTED_VALUE_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("counterpart public key is not a valid curve point")]
    InvalidPublicKey,

    #[error("ciphertext does not authenticate under this secret and nonce")]
    DecryptionMismatch,

    #[error("decrypted value does not fit in 64 bits")]
    ValueOutOfRange,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("key file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("key file format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Symmetric key shared with the computation cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    key: [u8; 32],
}

impl SharedSecret {
    pub fn from_key_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// One encrypted 64-bit field and the nonce it was sealed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EncryptedValue {
    pub ciphertext: [u8; ENCRYPTED_VALUE_LEN],
    pub nonce: u128,
}

impl EncryptedValue {
    pub fn as_bytes(&self) -> &[u8; ENCRYPTED_VALUE_LEN] {
        &self.ciphertext
    }
}
