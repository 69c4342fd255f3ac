use std::str::FromStr;

use chrono::{Duration, Utc};

use strongroom_core::{AuditEntry, AuditFilter, AuditLog, AuditOperation, AuditResult, ChainStatus};

use crate::app::AppContext;
use crate::cli::{AuditListArgs, AuditRotateArgs};
use crate::errors::CliError;
use crate::helpers::{format_timestamp, parse_datetime, parse_duration};
use crate::ui::{badge, print, table, Badge};

fn audit_log<'a>(ctx: &'a AppContext) -> anyhow::Result<&'a AuditLog> {
    ctx.session()?
        .audit_log()
        .ok_or_else(|| anyhow::anyhow!("No audit log configured"))
}

fn build_filter(args: &AuditListArgs) -> anyhow::Result<AuditFilter> {
    let mut filter = AuditFilter::new();
    if let Some(op) = args.operation.as_deref() {
        filter = filter.operation(AuditOperation::from_str(op)?);
    }
    if let Some(result) = args.result.as_deref() {
        filter = filter.result(AuditResult::from_str(result)?);
    }
    if let Some(document) = args.document.as_deref() {
        filter = filter.document(document);
    }
    if let Some(last) = args.last.as_deref() {
        filter = filter.since(Utc::now() - parse_duration(last)?);
    }
    if let Some(since) = args.since.as_deref() {
        filter = filter.since(parse_datetime(since)?);
    }
    if let Some(until) = args.until.as_deref() {
        filter = filter.until(parse_datetime(until)?);
    }
    if let Some(limit) = args.limit {
        filter = filter.limit(limit);
    }
    Ok(filter)
}

pub fn handle_list(ctx: &AppContext, args: &AuditListArgs) -> anyhow::Result<()> {
    if args.last.is_some() && args.since.is_some() {
        return Err(CliError::invalid_input("--last cannot be combined with --since").into());
    }
    let filter = build_filter(args)?;
    let entries = audit_log(ctx)?.query(&filter)?;
    let mode = ctx.output_mode(args.json);

    if mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        if !ctx.quiet() && mode.is_pretty() {
            println!("No matching audit entries.");
        }
        return Ok(());
    }
    print(&table(
        mode,
        &["SEQ", "TIME", "OPERATION", "RESULT", "DOCUMENT", "DETAILS"],
        &rows(&entries),
    ));
    Ok(())
}

fn rows(entries: &[AuditEntry]) -> Vec<Vec<String>> {
    entries
        .iter()
        .map(|entry| {
            let details = match &entry.details {
                serde_json::Value::Object(map) if map.is_empty() => String::new(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            vec![
                entry.seq.to_string(),
                format_timestamp(&entry.timestamp),
                entry.operation.to_string(),
                entry.result.to_string(),
                entry.document_id.clone().unwrap_or_default(),
                details,
            ]
        })
        .collect()
}

pub fn handle_verify(ctx: &AppContext) -> anyhow::Result<()> {
    match audit_log(ctx)?.verify()? {
        ChainStatus::Intact { entries } => {
            if !ctx.quiet() {
                print(&badge(
                    ctx.output_mode(false),
                    Badge::Ok,
                    &format!("Audit chain intact ({} entries)", entries),
                ));
            }
            Ok(())
        }
        ChainStatus::Broken { seq, reason } => Err(anyhow::anyhow!(
            "Audit chain broken at entry {}: {}",
            seq,
            reason
        )),
    }
}

pub fn handle_rotate(ctx: &AppContext, args: &AuditRotateArgs) -> anyhow::Result<()> {
    let audit = audit_log(ctx)?;
    let removed = if args.keep.is_some() || args.max_age_days.is_some() {
        audit.rotate(
            args.keep,
            args.max_age_days.map(|days| Duration::days(i64::from(days))),
        )?
    } else if audit.config().max_entries.is_some() || audit.config().max_age_days.is_some() {
        audit.rotate_configured()?
    } else {
        return Err(CliError::invalid_input_with_hint(
            "Nothing to rotate: no entry or age limit given",
            "Hint: Pass --keep or --max-age-days, or set [audit] max_entries / max_age_days.",
        )
        .into());
    };
    if !ctx.quiet() {
        print(&badge(
            ctx.output_mode(false),
            Badge::Ok,
            &format!("Removed {} audit entries", removed),
        ));
    }
    Ok(())
}
