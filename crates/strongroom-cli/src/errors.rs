//! CLI error types and the mapping from core errors to exit codes.

use std::fmt;

use strongroom_core::VaultError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, plaintext source)
    NotFound { message: String, hint: String },

    /// Invalid user input or a missing confirmation flag
    InvalidInput { message: String, hint: Option<String> },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, .. } => write!(f, "{}", message),
            CliError::InvalidInput { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput {
            message: message.into(),
            hint: None,
        }
    }

    pub fn invalid_input_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::InvalidInput {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput { .. } => exit_codes::INVALID_INPUT,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            CliError::NotFound { hint, .. } => Some(hint),
            CliError::InvalidInput { hint, .. } => hint.as_deref(),
        }
    }
}

/// Exit code for a core error.
pub fn vault_exit_code(err: &VaultError) -> i32 {
    match err {
        VaultError::NotInitialized | VaultError::NotFound(_) => exit_codes::NOT_FOUND,
        VaultError::InvalidInput(_)
        | VaultError::InvalidConfig(_)
        | VaultError::ConfirmationRequired(_)
        | VaultError::AlreadyInitialized => exit_codes::INVALID_INPUT,
        VaultError::Authentication { .. }
        | VaultError::SessionLocked
        | VaultError::KeyUnavailable => exit_codes::AUTH_FAILED,
        VaultError::Lockout { .. } => exit_codes::LOCKOUT,
        VaultError::DatabaseLocked => exit_codes::DATABASE_LOCKED,
        _ => 1,
    }
}

fn vault_hint(err: &VaultError) -> Option<&'static str> {
    match err {
        VaultError::NotInitialized => Some("Hint: Run `strongroom init` to create the vault."),
        VaultError::AlreadyInitialized => Some(
            "Hint: Use `strongroom password change`, or `strongroom password reset \
             --confirm-data-loss` to start over.",
        ),
        VaultError::SessionLocked => Some("Hint: Run `strongroom unlock` first."),
        VaultError::KeyUnavailable => {
            Some("Hint: Set STRONGROOM_PASSWORD or run interactively to load the key.")
        }
        VaultError::Authentication { .. } => Some(
            "Hint: If the password is lost, the vault cannot be recovered; \
             `strongroom password reset --confirm-data-loss` destroys it.",
        ),
        VaultError::Lockout { .. } => {
            Some("Hint: Wait for the lockout to end; every attempt is refused until then.")
        }
        VaultError::DatabaseLocked => Some(
            "Hint: The database does not match the vault key. It may belong to another vault.",
        ),
        VaultError::ConfirmationRequired(_) => {
            Some("Hint: Pass --confirm-data-loss to proceed.")
        }
        _ => None,
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(vault) = err.downcast_ref::<VaultError>() {
        return vault_exit_code(vault);
    }
    1
}

/// Follow-up advice for an error, if there is any.
pub fn error_hint(err: &anyhow::Error) -> Option<String> {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.hint().map(String::from);
    }
    err.downcast_ref::<VaultError>()
        .and_then(vault_hint)
        .map(String::from)
}
