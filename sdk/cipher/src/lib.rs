//! Shadowlend Confidential Cipher
//!
//! Amounts that must stay hidden on the public ledger are encrypted on the
//! client under a key shared with the computation cluster.
//!
//! ```text
//! 1. shared   = X25519(client_secret, cluster_public)
//! 2. key      = HKDF-SHA256(shared, "shadowlend-amount-v1")
//! 3. lane i   = XChaCha20-Poly1305(key, nonce + i, value_i as u128 LE)
//! 4. block    = ciphertext (16) || tag (16)        -> 32 bytes per value
//! ```
//!
//! Encryption is deterministic for a fixed (secret, nonce, plaintext) so a
//! retried request produces byte-identical arguments.

pub mod crypto;
pub mod keys;
pub mod types;

pub use crypto::{decrypt, decrypt_u128, derive_shared_secret, encrypt, random_nonce};
pub use keys::KeyMaterial;
pub use types::{CipherError, ENCRYPTED_VALUE_LEN, EncryptedValue, SharedSecret};
