//! Application-level utilities for the Strongroom CLI.
//!
//! - Application context (CLI args + config file + session manager)
//! - Path resolution for config and vault directories
//! - Password input from the environment or a prompt

mod context;
mod password;
mod resolver;

pub use context::AppContext;
pub use password::{confirm_destructive, read_initial_password, read_new_password, read_password};
