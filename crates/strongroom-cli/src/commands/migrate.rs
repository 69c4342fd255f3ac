use std::path::PathBuf;

use secrecy::ExposeSecret;

use strongroom_core::VaultError;

use crate::app::{read_password, AppContext};
use crate::cli::MigrateArgs;
use crate::errors::CliError;
use crate::ui::{badge, kv, print, Badge, Spinner};

pub fn handle_migrate(ctx: &AppContext, args: &MigrateArgs) -> anyhow::Result<()> {
    let source = PathBuf::from(&args.source);
    if !source.is_file() {
        return Err(CliError::not_found(
            format!("No database at {}", source.display()),
            "Hint: Pass the path of an existing plaintext SQLite file.",
        )
        .into());
    }

    let session = ctx.session()?;
    if !session.is_active() {
        return Err(VaultError::SessionLocked.into());
    }
    let password = read_password(ctx.no_input())?;
    Spinner::wrap("Verifying password", ctx.quiet(), || {
        session.resume(password.expose_secret())
    })?;

    let report = Spinner::wrap("Encrypting", ctx.quiet(), || session.migrate_from(&source))?;

    if !ctx.quiet() {
        let mode = ctx.output_mode(false);
        print(&badge(mode, Badge::Ok, "Database migrated"));
        print(&kv(mode, "Tables", &report.tables.join(", ")));
        print(&kv(mode, "Indexes", &report.indexes.join(", ")));
        print(&kv(mode, "Rows", &report.rows.to_string()));
        if mode.is_pretty() {
            println!(
                "\nThe plaintext source was left in place; remove it once you have checked the vault."
            );
        }
    }
    Ok(())
}
