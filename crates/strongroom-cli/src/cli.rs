use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;

use strongroom_core::VERSION;

/// Strongroom - password-protected local vault for indexed documents
#[derive(Parser)]
#[command(name = "strongroom")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Vault data directory
    #[arg(long, global = true, env = "STRONGROOM_HOME")]
    pub vault: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/strongroom/config.toml)
    #[arg(long, global = true, env = "STRONGROOM_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never prompt; read passwords from the environment only
    #[arg(long, global = true)]
    pub no_input: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the vault and set its password
    Init,

    /// Unlock the vault for the configured auto-lock window
    Unlock(UnlockArgs),

    /// Lock the vault now
    Lock,

    /// Show session state and lockout status
    Status(StatusArgs),

    /// Change or reset the vault password
    #[command(subcommand)]
    Password(PasswordCommand),

    /// Delete documents from the vault database
    Delete(DeleteArgs),

    /// Manage document sensitivity tiers
    #[command(subcommand)]
    Tier(TierCommand),

    /// Inspect the audit trail
    #[command(subcommand)]
    Audit(AuditCommand),

    /// Import a plaintext SQLite database as the vault database
    Migrate(MigrateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `unlock` command
#[derive(Args)]
pub struct UnlockArgs {
    /// Restart the auto-lock window of an already unlocked session
    #[arg(long)]
    pub extend: bool,
}

/// Arguments for the `status` command
#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum PasswordCommand {
    /// Set a new password; the database is re-encrypted under the new key
    Change,

    /// Destroy the vault when the password is lost
    Reset(ResetArgs),
}

/// Arguments for `password reset`
#[derive(Args)]
pub struct ResetArgs {
    /// Acknowledge that every document in the vault is destroyed
    #[arg(long)]
    pub confirm_data_loss: bool,
}

/// Arguments for the `delete` command
#[derive(Args)]
#[command(group(ArgGroup::new("level").args(["secure", "purge"])))]
pub struct DeleteArgs {
    /// Document ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,

    /// Scrub the rows in place before deleting them
    #[arg(long)]
    pub secure: bool,

    /// Delete, then rotate the key so older copies cannot be opened
    #[arg(long, conflicts_with = "secure")]
    pub purge: bool,

    /// Required with --purge
    #[arg(long)]
    pub confirm_data_loss: bool,
}

#[derive(Subcommand)]
pub enum TierCommand {
    /// Assign a tier to one or more documents
    Set(TierSetArgs),

    /// Show the tier of a document
    Show(TierIdArgs),

    /// List tier assignments
    List(TierListArgs),

    /// Move a document one tier up
    Promote(TierIdArgs),

    /// Move a document one tier down
    Demote(TierIdArgs),
}

/// Arguments for `tier set`
#[derive(Args)]
pub struct TierSetArgs {
    /// Target tier (public, personal, sensitive, critical or 0-3)
    #[arg(value_name = "TIER")]
    pub tier: String,

    /// Document ids
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

/// Arguments for tier commands taking one document
#[derive(Args)]
pub struct TierIdArgs {
    /// Document id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `tier list`
#[derive(Args)]
pub struct TierListArgs {
    /// Only documents at this tier
    #[arg(long)]
    pub tier: Option<String>,

    /// Show per-tier counts instead of documents
    #[arg(long)]
    pub counts: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum AuditCommand {
    /// List audit entries
    List(AuditListArgs),

    /// Check the hash chain
    Verify,

    /// Drop old entries (defaults to the configured limits)
    Rotate(AuditRotateArgs),
}

/// Arguments for `audit list`
#[derive(Args)]
pub struct AuditListArgs {
    /// Filter by operation (e.g. unlock, delete, tier)
    #[arg(long)]
    pub operation: Option<String>,

    /// Filter by result (success, failure, denied)
    #[arg(long)]
    pub result: Option<String>,

    /// Filter by document id
    #[arg(long)]
    pub document: Option<String>,

    /// Time window (e.g., "7d", "24h")
    #[arg(long)]
    pub last: Option<String>,

    /// Start date (ISO-8601 or YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// End date (ISO-8601 or YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,

    /// Show only the newest N matches
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `audit rotate`
#[derive(Args)]
pub struct AuditRotateArgs {
    /// Keep at most this many entries
    #[arg(long)]
    pub keep: Option<usize>,

    /// Drop entries older than this many days
    #[arg(long)]
    pub max_age_days: Option<u32>,
}

/// Arguments for the `migrate` command
#[derive(Args)]
pub struct MigrateArgs {
    /// Plaintext SQLite database to import
    #[arg(value_name = "PATH")]
    pub source: String,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}
