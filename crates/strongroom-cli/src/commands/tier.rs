use std::str::FromStr;

use strongroom_core::{DataTier, TierManager};

use crate::app::AppContext;
use crate::cli::{TierIdArgs, TierListArgs, TierSetArgs};
use crate::ui::{badge, kv, print, table, Badge};

fn parse_tier(value: &str) -> anyhow::Result<DataTier> {
    Ok(DataTier::from_str(value)?)
}

pub fn handle_set(ctx: &AppContext, args: &TierSetArgs) -> anyhow::Result<()> {
    let tier = parse_tier(&args.tier)?;
    let session = ctx.session()?;
    let tiers = TierManager::for_session(session);
    let mode = ctx.output_mode(false);

    if let [id] = args.ids.as_slice() {
        let previous = tiers.set_tier(id, tier)?;
        if !ctx.quiet() {
            print(&badge(
                mode,
                Badge::Ok,
                &format!("{}: {} -> {}", id, previous, tier),
            ));
        }
        return Ok(());
    }

    let ids: Vec<&str> = args.ids.iter().map(String::as_str).collect();
    let changed = tiers.bulk_set_tier(&ids, tier)?;
    if !ctx.quiet() {
        print(&badge(
            mode,
            Badge::Ok,
            &format!("{} of {} document(s) now {}", changed, ids.len(), tier),
        ));
    }
    Ok(())
}

pub fn handle_show(ctx: &AppContext, args: &TierIdArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let tiers = TierManager::for_session(session);
    let tier = tiers.get_tier(&args.id)?;
    let accessible = tiers.can_access(tier);
    let mode = ctx.output_mode(args.json);

    if mode.is_json() {
        let value = serde_json::json!({
            "id": args.id,
            "tier": tier,
            "level": tier.level(),
            "accessible": accessible,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    print(&kv(mode, "Document", &args.id));
    print(&kv(mode, "Tier", tier.name()));
    print(&kv(
        mode,
        "Accessible",
        if accessible { "yes" } else { "no (vault locked)" },
    ));
    Ok(())
}

pub fn handle_list(ctx: &AppContext, args: &TierListArgs) -> anyhow::Result<()> {
    let filter = args.tier.as_deref().map(parse_tier).transpose()?;
    let session = ctx.session()?;
    let tiers = TierManager::for_session(session);
    let mode = ctx.output_mode(args.json);

    if args.counts {
        let counts = tiers.tier_counts()?;
        if mode.is_json() {
            println!("{}", serde_json::to_string_pretty(&counts)?);
        } else {
            let rows: Vec<Vec<String>> = counts
                .iter()
                .map(|(tier, count)| vec![tier.to_string(), count.to_string()])
                .collect();
            print(&table(mode, &["TIER", "DOCUMENTS"], &rows));
        }
        return Ok(());
    }

    let documents = tiers.list_documents(filter)?;
    if mode.is_json() {
        let values: Vec<serde_json::Value> = documents
            .iter()
            .map(|(id, tier)| serde_json::json!({ "id": id, "tier": tier }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }
    if documents.is_empty() {
        if !ctx.quiet() && mode.is_pretty() {
            println!("No tier assignments. Unassigned documents are {}.", DataTier::default());
        }
        return Ok(());
    }
    let ceiling = tiers.accessible_ceiling();
    let rows: Vec<Vec<String>> = documents
        .iter()
        .map(|(id, tier)| {
            vec![
                id.clone(),
                tier.to_string(),
                if *tier <= ceiling { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print(&table(mode, &["ID", "TIER", "ACCESSIBLE"], &rows));
    Ok(())
}

pub fn handle_promote(ctx: &AppContext, args: &TierIdArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let tiers = TierManager::for_session(session);
    let moved = tiers.promote_tier(&args.id)?;
    report_move(ctx, args, moved, "highest")
}

pub fn handle_demote(ctx: &AppContext, args: &TierIdArgs) -> anyhow::Result<()> {
    let session = ctx.session()?;
    let tiers = TierManager::for_session(session);
    let moved = tiers.demote_tier(&args.id)?;
    report_move(ctx, args, moved, "lowest")
}

fn report_move(
    ctx: &AppContext,
    args: &TierIdArgs,
    moved: Option<DataTier>,
    bound: &str,
) -> anyhow::Result<()> {
    let mode = ctx.output_mode(args.json);
    if mode.is_json() {
        let value = serde_json::json!({ "id": args.id, "tier": moved, "changed": moved.is_some() });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    if ctx.quiet() {
        return Ok(());
    }
    match moved {
        Some(tier) => print(&badge(mode, Badge::Ok, &format!("{} is now {}", args.id, tier))),
        None => print(&badge(
            mode,
            Badge::Warn,
            &format!("{} is already at the {} tier", args.id, bound),
        )),
    }
    Ok(())
}
