use std::fs;
use std::io::Write;
use std::path::Path;

use chacha20poly1305::aead::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::derive_shared_secret;
use crate::types::{CipherError, SharedSecret};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// A client's X25519 key pair for exchanging keys with the cluster.
/// NEVER expose the secret half.
pub struct KeyMaterial {
    secret: StaticSecret,
    public: PublicKey,
}

/// On-disk format
#[derive(Serialize, Deserialize)]
struct KeyFile {
    secret_key: String,
    public_key: String,
}

impl KeyMaterial {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public half, sent with every confidential request so the cluster can
    /// encrypt results back to us.
    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn shared_secret(&self, cluster_public: &[u8; 32]) -> Result<SharedSecret, CipherError> {
        derive_shared_secret(&self.secret, cluster_public)
    }

    /// Writes the key pair as JSON, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<(), CipherError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = KeyFile {
            secret_key: hex::encode(self.secret.to_bytes()),
            public_key: hex::encode(self.public.as_bytes()),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut out = options.open(path)?;

        // mode() only applies on creation; tighten an existing file before writing
        #[cfg(unix)]
        out.set_permissions(fs::Permissions::from_mode(0o600))?;

        out.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CipherError> {
        let file: KeyFile = serde_json::from_str(&fs::read_to_string(path)?)?;

        let secret = decode_key(&file.secret_key, "secret_key")?;
        let material = Self::from_secret_bytes(secret);

        let public = decode_key(&file.public_key, "public_key")?;
        if public != material.public_key() {
            return Err(CipherError::InvalidKeyMaterial(
                "public_key does not match secret_key".into(),
            ));
        }
        Ok(material)
    }

    /// Loads the key pair at `path`, creating and persisting one if absent.
    pub fn load_or_generate(path: &Path) -> Result<Self, CipherError> {
        if path.exists() {
            return Self::load(path);
        }
        let material = Self::generate();
        material.save(path)?;
        Ok(material)
    }
}

fn decode_key(value: &str, field: &str) -> Result<[u8; 32], CipherError> {
    hex::decode(value)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| CipherError::InvalidKeyMaterial(format!("{field} must be 32 hex bytes")))
}
