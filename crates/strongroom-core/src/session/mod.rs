//! Unlock/lock lifecycle.
//!
//! ```text
//! Uninitialized --init--> Locked --unlock ok--> Unlocked
//!                           ^                      |
//!                           +--timeout / lock------+
//! ```
//!
//! Wrong passwords count toward a lockout that refuses every attempt,
//! correct or not, until its window passes. Expiry has no timer; it is
//! checked whenever the state is read.
//!
//! The CLI runs as short-lived processes, so the state (never the key) is
//! persisted and every read-modify-write of it happens under an exclusive
//! file lock.

mod config;
mod manager;
mod state;

pub use config::SessionConfig;
pub use manager::SessionManager;
pub use state::{SessionState, SessionStatus};
