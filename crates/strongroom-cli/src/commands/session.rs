//! `unlock`, `lock` and `status`.

use secrecy::ExposeSecret;

use strongroom_core::{SessionState, SessionStatus};

use crate::app::{read_password, AppContext};
use crate::cli::{StatusArgs, UnlockArgs};
use crate::helpers::{format_seconds, format_timestamp};
use crate::ui::{badge, kv, print, Badge, OutputMode, Spinner};

pub fn handle_unlock(ctx: &AppContext, args: &UnlockArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let mode = ctx.output_mode(false);

    if args.extend && session.is_active() {
        let expires_at = session.extend()?;
        if !ctx.quiet() {
            print(&badge(mode, Badge::Ok, "Session extended"));
            print(&kv(mode, "Expires", &expiry_text(expires_at.as_ref())));
        }
        return Ok(());
    }

    let password = read_password(ctx.no_input())?;
    let status = Spinner::wrap("Unlocking", ctx.quiet(), || {
        session.unlock(password.expose_secret())
    })?;

    if !ctx.quiet() {
        print(&badge(mode, Badge::Ok, "Vault unlocked"));
        let expires_at = match status.state {
            SessionState::Unlocked { expires_at, .. } => expires_at,
            _ => None,
        };
        print(&kv(mode, "Expires", &expiry_text(expires_at.as_ref())));
    }
    Ok(())
}

pub fn handle_lock(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.session()?.lock()?;
    if !ctx.quiet() {
        print(&badge(ctx.output_mode(false), Badge::Ok, "Vault locked"));
    }
    Ok(())
}

pub fn handle_status(ctx: &AppContext, args: &StatusArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let status = session.status()?;
    let mode = ctx.output_mode(args.json);

    if mode.is_json() {
        let mut value = serde_json::to_value(&status)?;
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "vault".to_string(),
                serde_json::Value::String(session.paths().root().display().to_string()),
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for line in status_lines(mode, &status) {
        print(&line);
    }
    Ok(())
}

fn expiry_text(expires_at: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    expires_at
        .map(format_timestamp)
        .unwrap_or_else(|| "never".to_string())
}

fn status_lines(mode: OutputMode, status: &SessionStatus) -> Vec<String> {
    let mut lines = vec![kv(mode, "State", status.state.name())];
    if let Some(seconds) = status.expires_in_seconds {
        lines.push(kv(mode, "Auto-lock in", &format_seconds(seconds)));
    } else if status.state.is_unlocked() {
        lines.push(kv(mode, "Auto-lock in", "never"));
    }
    if matches!(status.state, SessionState::Uninitialized) {
        return lines;
    }
    lines.push(kv(mode, "Failed attempts", &status.failed_attempts.to_string()));
    lines.push(kv(
        mode,
        "Attempts remaining",
        &status.attempts_remaining.to_string(),
    ));
    if let Some(until) = status.locked_out_until {
        lines.push(kv(mode, "Locked out until", &format_timestamp(&until)));
    }
    lines
}
