//! Cryptographic operations for Strongroom.
//!
//! This module provides key derivation and password verification using
//! well-audited libraries:
//! - **Argon2id**: Memory-hard key derivation function
//! - **BLAKE3**: One-way fingerprint of a derived key for verification
//!
//! ## Security Model
//!
//! - Password-based key derivation with a fresh random salt per key
//! - Only the salt and a fingerprint of the key are ever persisted
//! - Key material zeroized from memory on drop
//! - Fingerprint comparison in constant time

pub mod config;
pub mod kdf;
pub mod passphrase;
pub mod verification;

pub use config::CryptoConfig;
pub use kdf::{
    derive_key, derive_key_with_verification, fingerprint, generate_salt, verify_key, KeyMaterial,
    MIN_SALT_LENGTH,
};
pub use passphrase::validate_passphrase;
pub use verification::{VerificationRecord, VerificationStore};
