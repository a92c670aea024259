use shadowlend_cipher::{CipherError, KeyMaterial, decrypt, encrypt};

#[test]
fn save_then_load_keeps_the_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys").join("x25519.json");

    let original = KeyMaterial::generate();
    original.save(&path).unwrap();
    let loaded = KeyMaterial::load(&path).unwrap();

    assert_eq!(original.public_key(), loaded.public_key());
}

#[cfg(unix)]
#[test]
fn key_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x25519.json");
    KeyMaterial::generate().save(&path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn overwriting_a_readable_file_tightens_it_before_writing() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x25519.json");
    std::fs::write(&path, "{}").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let keys = KeyMaterial::generate();
    keys.save(&path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(KeyMaterial::load(&path).unwrap().public_key(), keys.public_key());
}

#[test]
fn load_or_generate_is_stable_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x25519.json");

    let first = KeyMaterial::load_or_generate(&path).unwrap();
    let second = KeyMaterial::load_or_generate(&path).unwrap();
    assert_eq!(first.public_key(), second.public_key());
}

#[test]
fn mismatched_public_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x25519.json");
    let json = format!(
        r#"{{"secret_key":"{}","public_key":"{}"}}"#,
        hex::encode([1u8; 32]),
        hex::encode([2u8; 32])
    );
    std::fs::write(&path, json).unwrap();

    assert!(matches!(
        KeyMaterial::load(&path),
        Err(CipherError::InvalidKeyMaterial(_))
    ));
}

#[test]
fn client_and_cluster_share_a_decryptable_channel() {
    let client = KeyMaterial::from_secret_bytes([3u8; 32]);
    let cluster = KeyMaterial::from_secret_bytes([4u8; 32]);

    let client_side = client.shared_secret(&cluster.public_key()).unwrap();
    let cluster_side = cluster.shared_secret(&client.public_key()).unwrap();

    let blocks = encrypt(&client_side, &[1000, 2000, 3000], 77).unwrap();
    let values: Vec<u64> = blocks
        .iter()
        .map(|b| decrypt(&cluster_side, &b.ciphertext, b.nonce).unwrap())
        .collect();
    assert_eq!(values, vec![1000, 2000, 3000]);
}
