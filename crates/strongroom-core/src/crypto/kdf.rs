//! Key derivation using Argon2id.
//!
//! This module derives encryption keys from passwords using the Argon2id
//! algorithm, which is memory-hard and resistant to GPU-based attacks.

use argon2::Argon2;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::config::CryptoConfig;
use crate::error::{Result, VaultError};

/// Shortest salt accepted by [`derive_key`].
pub const MIN_SALT_LENGTH: usize = 8;

/// BLAKE3 context string for verification fingerprints.
const VERIFICATION_CONTEXT: &str = "strongroom 2024 key verification";

/// Raw symmetric key bytes.
///
/// The buffer is zeroized when dropped. Clones are independent copies; the
/// [`KeyStore`](crate::keystore::KeyStore) hands these out so its own buffer
/// is never borrowed by callers.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    /// Wrap raw bytes.
    ///
    /// # Security
    ///
    /// The caller is responsible for ensuring the bytes come from a secure source.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate encryption operations.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Constant-time equality against another key.
    pub fn ct_eq(&self, other: &KeyMaterial) -> bool {
        self.bytes.as_slice().ct_eq(other.bytes.as_slice()).into()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Fill a fresh salt of `length` bytes from the OS RNG.
pub fn generate_salt(length: usize) -> Result<Vec<u8>> {
    if length < MIN_SALT_LENGTH {
        return Err(VaultError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }
    let mut salt = vec![0u8; length];
    getrandom::getrandom(&mut salt)
        .map_err(|e| VaultError::Crypto(format!("Failed to generate salt: {}", e)))?;
    Ok(salt)
}

/// Derive an encryption key from a password using Argon2id.
///
/// # Security
///
/// - Same password + salt + config always produces the same key (deterministic)
/// - Different salt produces a different key (salt must be stored)
/// - Memory-hard: cost is set by `config`
pub fn derive_key(password: &str, salt: &[u8], config: &CryptoConfig) -> Result<KeyMaterial> {
    let params = config.argon2_params()?;

    if password.is_empty() {
        return Err(VaultError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(VaultError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = Zeroizing::new(vec![0u8; config.key_length_bytes]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| VaultError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(KeyMaterial::from_bytes(std::mem::take(&mut *key_bytes)))
}

/// Re-derive from `password` and compare against `key` in constant time.
///
/// Any derivation failure (empty password, short salt, bad config) is a
/// plain `false`.
pub fn verify_key(password: &str, salt: &[u8], key: &KeyMaterial, config: &CryptoConfig) -> bool {
    match derive_key(password, salt, config) {
        Ok(candidate) => candidate.ct_eq(key),
        Err(_) => false,
    }
}

/// One-way fingerprint of a key, safe to persist next to the salt.
pub fn fingerprint(key: &KeyMaterial) -> [u8; 32] {
    blake3::derive_key(VERIFICATION_CONTEXT, key.as_bytes())
}

/// Derive the key and its verification fingerprint in one call.
pub fn derive_key_with_verification(
    password: &str,
    salt: &[u8],
    config: &CryptoConfig,
) -> Result<(KeyMaterial, [u8; 32])> {
    let key = derive_key(password, salt, config)?;
    let hash = fingerprint(&key);
    Ok((key, hash))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheapest parameters `validate` accepts.
    pub(crate) fn fast_config() -> CryptoConfig {
        CryptoConfig {
            memory_cost_kb: 8192,
            iterations: 1,
            parallelism: 1,
            key_length_bytes: 32,
            salt_length: 16,
        }
    }

    #[test]
    fn test_key_derivation_deterministic() {
        let salt = b"unique-salt-1234";

        let key1 = derive_key("test-password", salt, &fast_config()).unwrap();
        let key2 = derive_key("test-password", salt, &fast_config()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let key1 = derive_key("test-password", b"salt-one-1234567", &fast_config()).unwrap();
        let key2 = derive_key("test-password", b"salt-two-1234567", &fast_config()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_password_different_key() {
        let salt = b"fixed-salt-12345";
        let key1 = derive_key("password-one", salt, &fast_config()).unwrap();
        let key2 = derive_key("password-two", salt, &fast_config()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = derive_key("", b"salt-1234567890", &fast_config());
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_short_salt_rejected() {
        let result = derive_key("test-password", b"short", &fast_config());
        let err = result.unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
        assert!(err.to_string().contains("at least 8 bytes"));
    }

    #[test]
    fn test_eight_byte_salt_accepted() {
        assert!(derive_key("test-password", b"12345678", &fast_config()).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected_before_input_checks() {
        let config = CryptoConfig {
            memory_cost_kb: 1024,
            ..fast_config()
        };
        let result = derive_key("", b"short", &config);
        assert!(matches!(result, Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn test_key_length_follows_config() {
        let config = CryptoConfig {
            key_length_bytes: 48,
            ..fast_config()
        };
        let key = derive_key("test-password", b"salt-1234567890", &config).unwrap();
        assert_eq!(key.len(), 48);
    }

    #[test]
    fn test_verify_key() {
        let salt = b"salt-1234567890a";
        let key = derive_key("correct-horse", salt, &fast_config()).unwrap();

        assert!(verify_key("correct-horse", salt, &key, &fast_config()));
        assert!(!verify_key("wrong-horse", salt, &key, &fast_config()));
        assert!(!verify_key("", salt, &key, &fast_config()));
    }

    #[test]
    fn test_verification_hash_matches_fingerprint() {
        let salt = b"salt-1234567890a";
        let (key, hash) =
            derive_key_with_verification("correct-horse", salt, &fast_config()).unwrap();
        assert_eq!(hash, fingerprint(&key));
        assert_ne!(&hash[..], key.as_bytes());
    }

    #[test]
    fn test_generate_salt_is_fresh() {
        let a = generate_salt(16).unwrap();
        let b = generate_salt(16).unwrap();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert!(generate_salt(4).is_err());
    }

    #[test]
    fn test_key_material_debug_redacts() {
        let key = derive_key("test-password", b"salt-1234567890", &fast_config()).unwrap();

        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));

        let key_hex = hex::encode(&key.as_bytes()[..4]);
        assert!(!debug_output.contains(&key_hex));
    }
}
