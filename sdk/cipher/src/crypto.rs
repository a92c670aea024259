use chacha20poly1305::{
    Key, Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit, OsRng, rand_core::RngCore},
};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::types::{CipherError, ENCRYPTED_VALUE_LEN, EncryptedValue, SharedSecret};

const AMOUNT_KDF_INFO: &[u8] = b"shadowlend-amount-v1";

/// ECDH with the cluster's public key, then HKDF down to a symmetric key.
///
/// Fails with `InvalidPublicKey` when the counterpart is a low-order point,
/// which would make the shared secret independent of our key.
pub fn derive_shared_secret(
    my_secret: &StaticSecret,
    cluster_public: &[u8; 32],
) -> Result<SharedSecret, CipherError> {
    let their_pub = PublicKey::from(*cluster_public);
    let shared = my_secret.diffie_hellman(&their_pub);
    if !shared.was_contributory() {
        return Err(CipherError::InvalidPublicKey);
    }

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(AMOUNT_KDF_INFO, &mut key)
        .map_err(|_| CipherError::KeyDerivationFailed)?;
    Ok(SharedSecret::from_key_bytes(key))
}

/// Encrypt each value into its own 32-byte block. Lane `i` uses `nonce + i`.
pub fn encrypt(
    secret: &SharedSecret,
    values: &[u64],
    nonce: u128,
) -> Result<Vec<EncryptedValue>, CipherError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.key_bytes()));

    values
        .iter()
        .enumerate()
        .map(|(lane, value)| {
            let lane_nonce = nonce.wrapping_add(lane as u128);
            let mut block = u128::from(*value).to_le_bytes();
            let tag = cipher
                .encrypt_in_place_detached(&expand_nonce(lane_nonce), b"", &mut block)
                .map_err(|_| CipherError::EncryptionFailed)?;

            let mut ciphertext = [0u8; ENCRYPTED_VALUE_LEN];
            ciphertext[..16].copy_from_slice(&block);
            ciphertext[16..].copy_from_slice(&tag);
            Ok(EncryptedValue {
                ciphertext,
                nonce: lane_nonce,
            })
        })
        .collect()
}

/// Inverse of [`encrypt`] for a single block sealed under `nonce`.
pub fn decrypt(
    secret: &SharedSecret,
    ciphertext: &[u8; ENCRYPTED_VALUE_LEN],
    nonce: u128,
) -> Result<u64, CipherError> {
    let value = decrypt_u128(secret, ciphertext, nonce)?;
    u64::try_from(value).map_err(|_| CipherError::ValueOutOfRange)
}

/// Decrypt a block to its full 128-bit field value.
pub fn decrypt_u128(
    secret: &SharedSecret,
    ciphertext: &[u8; ENCRYPTED_VALUE_LEN],
    nonce: u128,
) -> Result<u128, CipherError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(secret.key_bytes()));

    let mut block = [0u8; 16];
    block.copy_from_slice(&ciphertext[..16]);
    let tag = Tag::from_slice(&ciphertext[16..]);

    cipher
        .decrypt_in_place_detached(&expand_nonce(nonce), b"", &mut block, tag)
        .map_err(|_| CipherError::DecryptionMismatch)?;
    Ok(u128::from_le_bytes(block))
}

/// Fresh 128-bit encryption nonce from the OS RNG.
pub fn random_nonce() -> u128 {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    u128::from_le_bytes(bytes)
}

/// 24-byte XChaCha nonce: the 128-bit nonce LE, zero padded.
fn expand_nonce(nonce: u128) -> XNonce {
    let mut bytes = [0u8; 24];
    bytes[..16].copy_from_slice(&nonce.to_le_bytes());
    *XNonce::from_slice(&bytes)
}
