//! Strongroom CLI - password-protected local vault for indexed documents
//!
//! Each invocation is a short-lived process: session state lives on disk,
//! the key only in the memory of the process that was given the password.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod logging;
mod ui;

use clap::Parser;
use strongroom_core::VERSION;

use crate::app::AppContext;
use crate::cli::{AuditCommand, Cli, Commands, PasswordCommand, TierCommand};
use crate::commands::{audit, delete, init, migrate, misc, password, session, tier};
use crate::errors::{error_hint, exit_code};
use crate::ui::print_error;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        tracing::debug!("Command failed: {:?}", e);
        print_error(&e.to_string(), error_hint(&e).as_deref());
        std::process::exit(exit_code(&e));
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init) => init::handle_init(ctx)?,
        Some(Commands::Unlock(args)) => session::handle_unlock(ctx, args)?,
        Some(Commands::Lock) => session::handle_lock(ctx)?,
        Some(Commands::Status(args)) => session::handle_status(ctx, args)?,
        Some(Commands::Password(command)) => match command {
            PasswordCommand::Change => password::handle_change(ctx)?,
            PasswordCommand::Reset(args) => password::handle_reset(ctx, args)?,
        },
        Some(Commands::Delete(args)) => delete::handle_delete(ctx, args)?,
        Some(Commands::Tier(command)) => match command {
            TierCommand::Set(args) => tier::handle_set(ctx, args)?,
            TierCommand::Show(args) => tier::handle_show(ctx, args)?,
            TierCommand::List(args) => tier::handle_list(ctx, args)?,
            TierCommand::Promote(args) => tier::handle_promote(ctx, args)?,
            TierCommand::Demote(args) => tier::handle_demote(ctx, args)?,
        },
        Some(Commands::Audit(command)) => match command {
            AuditCommand::List(args) => audit::handle_list(ctx, args)?,
            AuditCommand::Verify => audit::handle_verify(ctx)?,
            AuditCommand::Rotate(args) => audit::handle_rotate(ctx, args)?,
        },
        Some(Commands::Migrate(args)) => migrate::handle_migrate(ctx, args)?,
        Some(Commands::Completions(args)) => misc::handle_completions(args)?,
        None => {
            println!("Strongroom v{}", VERSION);
            println!("\nQuickstart:");
            println!("  strongroom init");
            println!("  strongroom unlock");
            println!("  strongroom tier set critical <id>");
            println!("  strongroom status");
            println!("  strongroom lock");
            println!("\nRun `strongroom --help` for full usage.");
        }
    }

    Ok(())
}
