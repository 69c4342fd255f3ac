//! Encrypted storage for the document index.
//!
//! The index keeps documents and their chunks (text + embedding vectors) in
//! a SQLCipher database. The page key is the raw key held by the
//! [`KeyStore`](crate::keystore::KeyStore); SQLCipher's own page HMAC check
//! is what rejects a wrong key, so there is no separate "is this the right
//! key" call.
//!
//! ## Durability
//!
//! Nothing that changes the key is done in place:
//! - migration writes `<dest>.partial` and renames it into place
//! - rekeying writes `<db>.rekey`, runs a caller commit step, then swaps
//!
//! A killed process leaves the original file and key usable.

pub mod encrypted;
pub mod traits;
pub mod types;

// Re-export public types
pub use encrypted::{EncryptedStore, MigrationReport};
pub use traits::{DocumentStore, OverwriteHook, ZeroFill};
pub use types::{NewChunk, NewDocument};
