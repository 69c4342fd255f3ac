use tracing_subscriber::EnvFilter;

use crate::constants::env_vars;

/// Install the stderr subscriber.
///
/// `STRONGROOM_LOG` takes an `EnvFilter` directive; without it the level is
/// `warn`, or `debug` for our crates under `--verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "warn,strongroom=debug,strongroom_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(env_vars::LOG).unwrap_or_else(|_| fallback.into());

    // A second init (tests driving `main` twice) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
