//! Error types for Strongroom core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps them to
//! exit codes and user-facing hints. No variant ever carries key material,
//! password text, or a full salt.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for Strongroom operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for Strongroom operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// KDF parameters rejected before any derivation work
    #[error("Invalid crypto configuration: {0}")]
    InvalidConfig(String),

    /// Invalid user input (empty password, short salt, bad identifier)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wrong password against a valid verification record
    #[error("Incorrect password ({attempts_remaining} attempts remaining before lockout)")]
    Authentication { attempts_remaining: u32 },

    /// Too many recent failures; every attempt is refused until `until`
    #[error("Too many failed attempts; locked out for another {remaining_seconds}s")]
    Lockout {
        until: DateTime<Utc>,
        remaining_seconds: i64,
    },

    /// Wrong key presented to an encrypted database
    #[error("Database is locked: the key does not match this database")]
    DatabaseLocked,

    /// Memory locking unavailable; callers log this and carry on
    #[error("Memory protection unavailable: {0}")]
    MemoryProtection(String),

    /// No verification record exists yet
    #[error("Vault is not initialized")]
    NotInitialized,

    /// `init` called on a vault that already has a verification record
    #[error("Vault is already initialized")]
    AlreadyInitialized,

    /// Operation needs an active, unlocked session
    #[error("Session is locked")]
    SessionLocked,

    /// Session is unlocked but this process holds no key
    #[error("No key loaded in this process; unlock again to load it")]
    KeyUnavailable,

    /// Destructive operation attempted without explicit confirmation
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Derivation or other primitive failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Audit trail unreadable or tampered
    #[error("Audit error: {0}")]
    Audit(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl VaultError {
    /// True for a plain wrong-password failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, VaultError::Authentication { .. })
    }

    /// True while the failed-attempt lockout is in force.
    pub fn is_lockout(&self) -> bool {
        matches!(self, VaultError::Lockout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_message_reports_remaining_time() {
        let err = VaultError::Lockout {
            until: Utc::now(),
            remaining_seconds: 42,
        };
        assert!(err.to_string().contains("42s"));
        assert!(err.is_lockout());
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_authentication_message_reports_attempts() {
        let err = VaultError::Authentication {
            attempts_remaining: 3,
        };
        assert!(err.to_string().contains("3 attempts remaining"));
        assert!(err.is_auth_failure());
    }
}
