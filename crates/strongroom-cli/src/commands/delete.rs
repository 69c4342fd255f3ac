use secrecy::ExposeSecret;

use strongroom_core::{DeletionLevel, DeletionRecord, SecureDeleter, VaultError};

use crate::app::{confirm_destructive, read_password, AppContext};
use crate::cli::DeleteArgs;
use crate::errors::CliError;
use crate::ui::{badge, print, table, Badge, Spinner};

fn level(args: &DeleteArgs) -> DeletionLevel {
    if args.purge {
        DeletionLevel::Cryptographic
    } else if args.secure {
        DeletionLevel::Secure
    } else {
        DeletionLevel::Standard
    }
}

pub fn handle_delete(ctx: &AppContext, args: &DeleteArgs) -> anyhow::Result<()> {
    let level = level(args);
    if level.rotates_key() {
        if !args.confirm_data_loss {
            return Err(VaultError::ConfirmationRequired(
                "--purge re-encrypts the whole vault and makes older copies unreadable".to_string(),
            )
            .into());
        }
        if !confirm_destructive(
            &format!("Purge {} document(s) and rotate the vault key?", args.ids.len()),
            ctx.no_input(),
        )? {
            return Err(CliError::invalid_input("Delete cancelled").into());
        }
    }

    let session = ctx.session()?;
    if !session.is_active() {
        return Err(VaultError::SessionLocked.into());
    }
    let password = read_password(ctx.no_input())?;
    Spinner::wrap("Verifying password", ctx.quiet(), || {
        session.resume(password.expose_secret())
    })?;

    let mut store = session.open_store()?;
    let ids: Vec<&str> = args.ids.iter().map(String::as_str).collect();
    let confirmation = level.rotates_key().then(|| password.expose_secret());
    let records = Spinner::wrap("Deleting", ctx.quiet(), || {
        SecureDeleter::new(session).delete(&mut store, &ids, level, confirmation)
    })?;

    if !ctx.quiet() {
        let mode = ctx.output_mode(false);
        print(&table(mode, &["ID", "CHUNKS", "LEVEL", "KEY ROTATED"], &rows(&records)));
        let rotated = records.iter().any(|record| record.key_rotated);
        let summary = if rotated {
            format!("Deleted {} document(s); vault key rotated", records.len())
        } else {
            format!("Deleted {} document(s)", records.len())
        };
        print(&badge(mode, Badge::Ok, &summary));
    }
    Ok(())
}

fn rows(records: &[DeletionRecord]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            vec![
                record.document_id.clone(),
                record.chunks_removed.to_string(),
                record.level.to_string(),
                if record.key_rotated { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect()
}
