//! Argon2id cost parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Lower bounds enforced by [`CryptoConfig::validate`].
const MIN_MEMORY_COST_KB: u32 = 8192;
const MIN_KEY_LENGTH_BYTES: usize = 16;
const MIN_SALT_LENGTH_BYTES: usize = 8;

/// Key derivation parameters.
///
/// Defaults balance security and usability:
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 4
/// - Key length: 32 bytes (256-bit page key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub memory_cost_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub key_length_bytes: usize,
    pub salt_length: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            memory_cost_kb: 64 * 1024,
            iterations: 3,
            parallelism: 4,
            key_length_bytes: 32,
            salt_length: 16,
        }
    }
}

impl CryptoConfig {
    /// Check every parameter against its floor.
    ///
    /// Always called before any derivation work starts.
    pub fn validate(&self) -> Result<()> {
        if self.memory_cost_kb < MIN_MEMORY_COST_KB {
            return Err(VaultError::InvalidConfig(format!(
                "memory_cost_kb must be at least {} (got {})",
                MIN_MEMORY_COST_KB, self.memory_cost_kb
            )));
        }
        if self.iterations < 1 {
            return Err(VaultError::InvalidConfig(
                "iterations must be at least 1".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(VaultError::InvalidConfig(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if self.key_length_bytes < MIN_KEY_LENGTH_BYTES {
            return Err(VaultError::InvalidConfig(format!(
                "key_length_bytes must be at least {} (got {})",
                MIN_KEY_LENGTH_BYTES, self.key_length_bytes
            )));
        }
        if self.salt_length < MIN_SALT_LENGTH_BYTES {
            return Err(VaultError::InvalidConfig(format!(
                "salt_length must be at least {} (got {})",
                MIN_SALT_LENGTH_BYTES, self.salt_length
            )));
        }
        Ok(())
    }

    /// Build the argon2 parameter set.
    pub(crate) fn argon2_params(&self) -> Result<argon2::Params> {
        self.validate()?;
        argon2::Params::new(
            self.memory_cost_kb,
            self.iterations,
            self.parallelism,
            Some(self.key_length_bytes),
        )
        .map_err(|e| VaultError::InvalidConfig(format!("Argon2 rejected parameters: {}", e)))
    }
}
