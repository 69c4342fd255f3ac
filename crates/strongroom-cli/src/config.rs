use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use strongroom_core::{AuditConfig, CryptoConfig, SessionConfig};

/// `config.toml`. Every section and field is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongroomConfig {
    pub vault: VaultSection,
    pub crypto: CryptoConfig,
    pub session: SessionConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    pub path: Option<String>,
}

impl StrongroomConfig {
    /// Reject settings the core would refuse later, before any prompt.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.crypto.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_vault_path() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

/// Read the config at `path`; a missing file yields the defaults.
pub fn read_config(path: &Path) -> anyhow::Result<StrongroomConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file; using defaults");
        return Ok(StrongroomConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    let config: StrongroomConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
    config.validate()?;
    Ok(config)
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("strongroom"));
        }
    }
    Ok(home_dir()?.join(".config").join("strongroom"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("strongroom"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("strongroom"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
