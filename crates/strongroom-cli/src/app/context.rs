//! Application context for the Strongroom CLI.
//!
//! Combines CLI arguments with the lazily-loaded config file and builds the
//! session manager every command works through.

use std::path::PathBuf;

use once_cell::unsync::OnceCell;

use strongroom_core::{AuditLog, SessionManager, VaultPaths};

use crate::cli::Cli;
use crate::config::{read_config, StrongroomConfig};
use crate::ui::OutputMode;

use super::resolver::{resolve_config_path, resolve_vault_path};

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<StrongroomConfig>,
    session: OnceCell<SessionManager>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            session: OnceCell::new(),
        }
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn no_input(&self) -> bool {
        self.cli.no_input
    }

    pub fn output_mode(&self, json: bool) -> OutputMode {
        OutputMode::detect(json)
    }

    /// The config file, loading it on first use.
    pub fn config(&self) -> anyhow::Result<&StrongroomConfig> {
        self.config
            .get_or_try_init(|| read_config(&resolve_config_path(self.cli)?))
    }

    pub fn vault_dir(&self) -> anyhow::Result<PathBuf> {
        resolve_vault_path(self.cli, self.config()?)
    }

    /// Session manager for the resolved vault, with auditing per config.
    pub fn session(&self) -> anyhow::Result<&SessionManager> {
        self.session.get_or_try_init(|| {
            let config = self.config()?;
            let root = self.vault_dir()?;
            tracing::debug!(vault = %root.display(), "Opening vault");
            let paths = VaultPaths::new(root);
            let audit = AuditLog::new(paths.audit(), config.audit.clone());
            let session = SessionManager::open(paths, config.session)?
                .with_crypto_config(config.crypto)
                .with_audit(audit);
            Ok(session)
        })
    }
}
