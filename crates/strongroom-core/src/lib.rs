//! # Strongroom Core
//!
//! Local credential and data-protection layer for a document index.
//!
//! This crate owns every secret the host application handles: the password
//! derived key, the on-disk verification record, the session that gates
//! access to sensitive documents, and the deletion paths that make removed
//! data unrecoverable. Parsing, embedding and ranking live elsewhere and only
//! ever see an already opened [`EncryptedStore`].
//!
//! ## Architecture
//!
//! - **crypto**: Argon2id key derivation and verification records
//! - **keystore**: in-memory custody of the active key (mlock + zeroize)
//! - **storage**: SQLCipher-backed document store, migration, rekeying
//! - **session**: unlock/lock lifecycle, auto-lock, failed-attempt lockout
//! - **tiers**: per-document sensitivity tiers gated on the session
//! - **deletion**: standard, secure and cryptographic deletion
//! - **audit**: hash-chained append-only audit trail
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the encrypted database file
//! - Offline and online brute-force of the password
//! - Recovery of deleted documents from stale copies of the database
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked process's memory

pub mod audit;
pub mod clock;
pub mod crypto;
pub mod deletion;
pub mod error;
pub mod fs;
pub mod keystore;
pub mod layout;
pub mod lock;
pub mod session;
pub mod storage;
pub mod tiers;

pub use audit::{
    AuditConfig, AuditEntry, AuditFilter, AuditLog, AuditOperation, AuditResult, ChainStatus,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{CryptoConfig, KeyMaterial, VerificationStore};
pub use deletion::{DeletionLevel, DeletionRecord, SecureDeleter};
pub use error::{Result, VaultError};
pub use keystore::{KeyMetadata, KeyStore};
pub use layout::VaultPaths;
pub use session::{SessionConfig, SessionManager, SessionState, SessionStatus};
pub use storage::{DocumentStore, EncryptedStore, MigrationReport, NewChunk, NewDocument};
pub use tiers::{DataTier, TierManager};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
