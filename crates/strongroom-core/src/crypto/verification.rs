//! Verification records: salt + one-way key fingerprint.
//!
//! A record lets a candidate password be checked without the real key ever
//! touching disk. It is safe to store in plaintext and is human-inspectable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::config::CryptoConfig;
use super::kdf::{derive_key_with_verification, fingerprint, generate_salt, KeyMaterial};
use crate::error::{Result, VaultError};
use crate::fs::write_atomic;

/// Current on-disk record format.
const RECORD_VERSION: u32 = 1;

/// Serialized form of a [`VerificationStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded BLAKE3 fingerprint of the derived key.
    pub verification_hash: String,
    /// KDF parameters the key was derived with.
    #[serde(default)]
    pub kdf: CryptoConfig,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

/// Salt + fingerprint pair used to check candidate keys.
///
/// Holds no key bytes; [`verify`](Self::verify) fingerprints the candidate
/// and compares in constant time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationStore {
    salt: Vec<u8>,
    verification_hash: Vec<u8>,
    kdf: CryptoConfig,
}

impl VerificationStore {
    pub fn new(salt: Vec<u8>, verification_hash: Vec<u8>) -> Self {
        Self::with_config(salt, verification_hash, CryptoConfig::default())
    }

    pub fn with_config(salt: Vec<u8>, verification_hash: Vec<u8>, kdf: CryptoConfig) -> Self {
        Self {
            salt,
            verification_hash,
            kdf,
        }
    }

    /// Pick a fresh salt, derive the key, and build the matching record.
    pub fn create(password: &str, config: &CryptoConfig) -> Result<(Self, KeyMaterial)> {
        config.validate()?;
        let salt = generate_salt(config.salt_length)?;
        let (key, hash) = derive_key_with_verification(password, &salt, config)?;
        Ok((Self::with_config(salt, hash.to_vec(), *config), key))
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn kdf(&self) -> &CryptoConfig {
        &self.kdf
    }

    /// True if `candidate` fingerprints to the stored hash.
    pub fn verify(&self, candidate: &KeyMaterial) -> bool {
        let computed = fingerprint(candidate);
        computed.as_slice().ct_eq(&self.verification_hash).into()
    }

    pub fn to_record(&self) -> VerificationRecord {
        VerificationRecord {
            version: RECORD_VERSION,
            salt: hex::encode(&self.salt),
            verification_hash: hex::encode(&self.verification_hash),
            kdf: self.kdf,
        }
    }

    pub fn from_record(record: &VerificationRecord) -> Result<Self> {
        if record.version != RECORD_VERSION {
            return Err(VaultError::Storage(format!(
                "Unsupported verification record version {}",
                record.version
            )));
        }
        let salt = hex::decode(&record.salt)
            .map_err(|e| VaultError::Storage(format!("Invalid salt encoding: {}", e)))?;
        let verification_hash = hex::decode(&record.verification_hash).map_err(|e| {
            VaultError::Storage(format!("Invalid verification hash encoding: {}", e))
        })?;
        if verification_hash.len() != 32 {
            return Err(VaultError::Storage(
                "Verification hash must be 32 bytes".to_string(),
            ));
        }
        record.kdf.validate()?;
        Ok(Self::with_config(salt, verification_hash, record.kdf))
    }

    /// Load from a JSON record file; `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: VerificationRecord = serde_json::from_str(&contents)?;
        Self::from_record(&record).map(Some)
    }

    /// Persist atomically as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.to_record())?;
        write_atomic(path, &json)
    }
}
