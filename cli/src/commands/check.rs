//! Check command - store integrity
//!
//! Loads every handler and link exactly as the runtime would, applying the
//! configured corruption policy (`force_load`, `purge_corrupted`,
//! `quarantine_corrupted`), and reports what happened.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use config::Config;
use policy::PolicyManager;
use serde_json::json;
use storage::LoadReport;

use super::Session;
use crate::output;

#[derive(Args)]
pub struct CheckArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Also list quarantined handler records
    #[arg(long)]
    pub quarantine: bool,

    /// Exit with an error if the store has any problem (see the report)
    #[arg(long)]
    pub strict: bool,
}

pub async fn run(args: CheckArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let mut manager = PolicyManager::default();
    let report = session.store.load_all(&mut manager).await?;
    let quarantined = if args.quarantine {
        session.store.list_quarantined().await?
    } else {
        Vec::new()
    };

    if args.json {
        let value = json!({
            "loaded": report.loaded,
            "forced": report
                .forced
                .iter()
                .map(|(name, reason)| json!({ "name": name, "reason": reason.to_string() }))
                .collect::<Vec<_>>(),
            "corrupted": report
                .corrupted
                .iter()
                .map(|entry| json!({
                    "name": entry.name,
                    "reason": entry.reason.to_string(),
                    "purged": entry.purged,
                    "quarantined": entry.quarantined,
                }))
                .collect::<Vec<_>>(),
            "rejected": report
                .rejected
                .iter()
                .map(|(name, error)| json!({ "name": name, "reason": error.to_string() }))
                .collect::<Vec<_>>(),
            "global_loaded": report.global_loaded,
            "links": {
                "loaded": report.links_loaded,
                "skipped": report.links_skipped,
                "unreadable": report.links_unreadable,
                "purged": report.links_purged,
            },
            "quarantine": quarantined
                .iter()
                .map(|entry| json!({
                    "id": entry.id,
                    "name": entry.name,
                    "reason": entry.reason,
                    "quarantined_at": entry.quarantined_at,
                }))
                .collect::<Vec<_>>(),
            "clean": report.is_clean(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_report(&session.config, &report);
        if args.quarantine {
            println!();
            output::subheader("Quarantine");
            if quarantined.is_empty() {
                println!("  {}", "(empty)".dimmed());
            }
            for entry in &quarantined {
                println!(
                    "  #{:<4} {:<24} {}  {}",
                    entry.id,
                    entry.name,
                    entry.quarantined_at.dimmed(),
                    entry.reason
                );
            }
        }
    }

    if args.strict && !report.is_clean() {
        bail!("Store is not clean");
    }
    Ok(())
}

fn print_report(config: &Config, report: &LoadReport) {
    let policy = &config.storage;
    output::header("Store check");
    println!(
        "  Policy: force_load={} purge_corrupted={} quarantine_corrupted={}",
        policy.force_load, policy.purge_corrupted, policy.quarantine_corrupted
    );
    println!();

    println!("  {} handler(s) loaded", report.loaded.len());
    if report.global_loaded {
        println!("  global handler loaded from store");
    } else {
        println!("  global handler not stored, using an empty one");
    }
    println!(
        "  {} link(s) loaded, {} dangling kept, {} unreadable, {} purged",
        report.links_loaded, report.links_skipped, report.links_unreadable, report.links_purged
    );

    for (name, reason) in &report.forced {
        output::warn(&format!("Force-loaded corrupted handler {name}: {reason}"));
    }
    for entry in &report.corrupted {
        let action = match (entry.purged, entry.quarantined) {
            (true, true) => "purged, copy quarantined",
            (true, false) => "purged",
            (false, _) => "left in place",
        };
        output::error(&format!(
            "Corrupted handler {}: {} ({action})",
            entry.name, entry.reason
        ));
    }
    for (name, error) in &report.rejected {
        output::error(&format!("Rejected handler {name}: {error}"));
    }

    println!();
    if report.is_clean() {
        output::success("Store is clean");
    } else {
        output::warn("Store has problems, see above");
    }
}
