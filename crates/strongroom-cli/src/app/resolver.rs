//! Path resolution for config and vault directories.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::{default_config_path, default_vault_path, StrongroomConfig};

/// `--config` / `STRONGROOM_CONFIG`, else the XDG default.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(value) = cli.config.as_deref() {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// `--vault` / `STRONGROOM_HOME`, then `[vault] path`, then the XDG data dir.
pub fn resolve_vault_path(cli: &Cli, config: &StrongroomConfig) -> anyhow::Result<PathBuf> {
    if let Some(value) = cli.vault.as_deref() {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    if let Some(path) = config.vault.path.as_deref() {
        return Ok(PathBuf::from(path));
    }
    default_vault_path()
}
