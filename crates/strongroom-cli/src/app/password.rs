//! Password input: environment first, then an interactive prompt.
//!
//! Passwords are held as `SecretString` from the moment they are read and
//! only exposed at the call into the core.

use std::io::IsTerminal;

use dialoguer::{Confirm, Password};
use secrecy::SecretString;

use crate::constants::env_vars;
use crate::errors::CliError;

fn from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn interactive(no_input: bool) -> bool {
    !no_input && std::io::stdin().is_terminal()
}

fn no_tty(var: &str) -> anyhow::Error {
    CliError::invalid_input_with_hint(
        "No password provided and no TTY available",
        format!("Hint: Set {} or run interactively.", var),
    )
    .into()
}

/// The current vault password.
pub fn read_password(no_input: bool) -> anyhow::Result<SecretString> {
    if let Some(secret) = from_env(env_vars::PASSWORD) {
        return Ok(secret);
    }
    if !interactive(no_input) {
        return Err(no_tty(env_vars::PASSWORD));
    }
    Password::new()
        .with_prompt("Vault password")
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// A password being set for the first time (`init`).
pub fn read_initial_password(no_input: bool) -> anyhow::Result<SecretString> {
    if let Some(secret) = from_env(env_vars::PASSWORD) {
        return Ok(secret);
    }
    prompt_confirmed("Choose a vault password", no_input, env_vars::PASSWORD)
}

/// The replacement password for `password change`.
pub fn read_new_password(no_input: bool) -> anyhow::Result<SecretString> {
    if let Some(secret) = from_env(env_vars::NEW_PASSWORD) {
        return Ok(secret);
    }
    prompt_confirmed("New vault password", no_input, env_vars::NEW_PASSWORD)
}

fn prompt_confirmed(prompt: &str, no_input: bool, var: &str) -> anyhow::Result<SecretString> {
    if !interactive(no_input) {
        return Err(no_tty(var));
    }
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Second confirmation for destructive commands.
///
/// Only asked on a TTY; without one the confirmation flag stands alone.
pub fn confirm_destructive(question: &str, no_input: bool) -> anyhow::Result<bool> {
    if !interactive(no_input) {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read confirmation: {}", e))
}
