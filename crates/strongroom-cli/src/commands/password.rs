use secrecy::ExposeSecret;

use crate::app::{confirm_destructive, read_new_password, read_password, AppContext};
use crate::cli::ResetArgs;
use crate::errors::CliError;
use crate::ui::{badge, print, Badge, Spinner};

pub fn handle_change(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let old = read_password(ctx.no_input())?;
    let new = read_new_password(ctx.no_input())?;

    Spinner::wrap("Re-encrypting vault", ctx.quiet(), || {
        session.change_password(old.expose_secret(), new.expose_secret(), None)
    })?;

    if !ctx.quiet() {
        print(&badge(ctx.output_mode(false), Badge::Ok, "Password changed"));
    }
    Ok(())
}

pub fn handle_reset(ctx: &AppContext, args: &ResetArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    if !args.confirm_data_loss {
        // Refused and audited by the core.
        return session.reset(false).map_err(Into::into);
    }
    if !confirm_destructive(
        "Destroy the vault key, its records and every stored document?",
        ctx.no_input(),
    )? {
        return Err(CliError::invalid_input("Reset cancelled").into());
    }

    session.reset(true)?;
    if !ctx.quiet() {
        let mode = ctx.output_mode(false);
        print(&badge(mode, Badge::Warn, "Vault reset; all key material and data destroyed"));
        if mode.is_pretty() {
            println!("\nRun `strongroom init` to start a new vault.");
        }
    }
    Ok(())
}
