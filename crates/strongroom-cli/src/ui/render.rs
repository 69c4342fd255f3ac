//! Rendering primitives for CLI output.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table as ComfyTable};
use owo_colors::OwoColorize;

use super::mode::OutputMode;

/// Status marker printed before a one-line result.
#[derive(Debug, Clone, Copy)]
pub enum Badge {
    Ok,
    Warn,
}

/// `✓ message` in pretty mode, `status=ok` style otherwise.
pub fn badge(mode: OutputMode, kind: Badge, message: &str) -> String {
    match mode {
        OutputMode::Pretty => match kind {
            Badge::Ok => format!("{} {}", "✓".green(), message),
            Badge::Warn => format!("{} {}", "!".yellow(), message),
        },
        OutputMode::Plain | OutputMode::Json => message.to_string(),
    }
}

/// Aligned `Key: value` in pretty mode, `key=value` otherwise.
pub fn kv(mode: OutputMode, key: &str, value: &str) -> String {
    match mode {
        OutputMode::Pretty => format!("  {:<18} {}", format!("{}:", key).dimmed(), value),
        OutputMode::Plain | OutputMode::Json => {
            format!("{}={}", key.to_ascii_lowercase().replace([' ', '-'], "_"), value)
        }
    }
}

/// Render rows under `headers`.
///
/// Pretty mode draws a bordered table; plain mode prints tab-separated rows
/// without a header so scripts can `cut` them.
pub fn table(mode: OutputMode, headers: &[&str], rows: &[Vec<String>]) -> String {
    match mode {
        OutputMode::Pretty => {
            let mut table = ComfyTable::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
            );
            for row in rows {
                table.add_row(row);
            }
            table.to_string()
        }
        OutputMode::Plain | OutputMode::Json => rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Print `message` unless it is empty.
pub fn print(message: &str) {
    if !message.is_empty() {
        println!("{}", message);
    }
}

/// `Error: …` plus an optional hint line, on stderr.
pub fn print_error(message: &str, hint: Option<&str>) {
    eprintln!("Error: {}", message);
    if let Some(hint) = hint {
        eprintln!("{}", hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_plain_is_machine_friendly() {
        assert_eq!(kv(OutputMode::Plain, "Failed attempts", "2"), "failed_attempts=2");
    }

    #[test]
    fn test_table_plain_has_no_header() {
        let rows = vec![
            vec!["doc-a".to_string(), "critical".to_string()],
            vec!["doc-b".to_string(), "public".to_string()],
        ];
        let out = table(OutputMode::Plain, &["ID", "TIER"], &rows);
        assert_eq!(out, "doc-a\tcritical\ndoc-b\tpublic");
    }

    #[test]
    fn test_table_pretty_has_header() {
        let rows = vec![vec!["doc-a".to_string(), "critical".to_string()]];
        let out = table(OutputMode::Pretty, &["ID", "TIER"], &rows);
        assert!(out.contains("TIER"));
        assert!(out.contains("doc-a"));
    }

    #[test]
    fn test_badge_plain_is_bare_message() {
        assert_eq!(badge(OutputMode::Plain, Badge::Ok, "Vault locked"), "Vault locked");
    }
}
