//! Terminal output: mode selection, tables, badges and the KDF spinner.

mod mode;
mod progress;
mod render;

pub use mode::OutputMode;
pub use progress::Spinner;
pub use render::{badge, kv, print, print_error, table, Badge};
