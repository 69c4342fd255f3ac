//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (clap usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Vault not initialized, config or plaintext source missing.
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, or a destructive command without its confirmation flag.
    pub const INVALID_INPUT: i32 = 4;

    /// Wrong password, or the session must be unlocked first.
    pub const AUTH_FAILED: i32 = 5;

    /// Too many failed attempts; every unlock is refused until the window ends.
    pub const LOCKOUT: i32 = 6;

    /// The database rejected the key.
    pub const DATABASE_LOCKED: i32 = 7;
}

/// Environment variables read by the CLI.
pub mod env_vars {
    pub const PASSWORD: &str = "STRONGROOM_PASSWORD";
    pub const NEW_PASSWORD: &str = "STRONGROOM_NEW_PASSWORD";
    pub const LOG: &str = "STRONGROOM_LOG";
}
