use secrecy::ExposeSecret;

use strongroom_core::VaultError;

use crate::app::{read_initial_password, AppContext};
use crate::ui::{badge, kv, print, Badge, Spinner};

pub fn handle_init(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.session()?;
    if session.is_initialized() {
        return Err(VaultError::AlreadyInitialized.into());
    }

    let password = read_initial_password(ctx.no_input())?;
    Spinner::wrap("Deriving key", ctx.quiet(), || {
        session.init(password.expose_secret())
    })?;

    if !ctx.quiet() {
        let mode = ctx.output_mode(false);
        print(&badge(mode, Badge::Ok, "Vault initialized"));
        print(&kv(mode, "Path", &session.paths().root().display().to_string()));
        if mode.is_pretty() {
            println!("\nThe vault starts locked. Run `strongroom unlock` to open it.");
        }
    }
    Ok(())
}
