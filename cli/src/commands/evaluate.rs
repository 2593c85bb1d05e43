//! Evaluate command - offline resolution
//!
//! Loads the whole store into a [`PolicyManager`] and prints every handler
//! consulted for the query, highest priority first. Corrupted handlers are
//! reported and skipped, never purged.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use config::Config;
use policy::{PolicyManager, QueryContext};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use ward_core::{ActiveFlag, PassiveFlag, PermissionService, RegionId, Tristate, UserId};

use super::Session;
use crate::output;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Region to evaluate, as `name` or `name@world`; repeat for overlapping regions
    #[arg(short, long = "region", value_name = "REGION")]
    pub regions: Vec<RegionId>,

    /// Acting user of an active query
    #[arg(long, requires = "flag", conflicts_with = "passive")]
    pub actor: Option<UserId>,

    /// Active flag, e.g. BUILD
    #[arg(long, requires = "actor")]
    pub flag: Option<ActiveFlag>,

    /// Passive flag, e.g. FIRE_SPREAD
    #[arg(long, required_unless_present = "actor")]
    pub passive: Option<PassiveFlag>,

    /// World the query happens in, passed to permission checks
    #[arg(long)]
    pub world: Option<String>,

    /// Result when no handler has an opinion
    #[arg(long, default_value = "undefined")]
    pub default: Tristate,

    /// Permission node granted to the query; repeat as needed
    #[arg(long = "grant", value_name = "NODE")]
    pub grants: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Grants exactly the listed nodes, to any subject in any world.
struct GrantedNodes(HashSet<String>);

impl PermissionService for GrantedNodes {
    fn has_permission(&self, _subject: Option<&UserId>, node: &str, _world: Option<&str>) -> bool {
        self.0.contains(node)
    }
}

pub async fn run(args: EvaluateArgs, config: Config) -> Result<()> {
    let mut ctx = match (args.actor, args.flag, args.passive) {
        (Some(actor), Some(flag), None) => QueryContext::active(actor, flag),
        (None, None, Some(flag)) => QueryContext::passive(flag),
        _ => bail!("Give either --actor with --flag, or --passive"),
    };
    if let Some(world) = args.world {
        ctx = ctx.with_world(world);
    }

    let session = Session::open(config).await?;
    let grants = GrantedNodes(args.grants.into_iter().collect());
    let mut manager = PolicyManager::new(Arc::new(grants));
    let report = session.inspecting_store().load_all(&mut manager).await?;
    for corrupted in &report.corrupted {
        output::warn(&format!(
            "Skipped corrupted handler {}: {}",
            corrupted.name, corrupted.reason
        ));
    }

    let explanation = manager.explain(&args.regions, &ctx, args.default);

    if args.json {
        let steps: Vec<_> = explanation
            .steps
            .iter()
            .map(|step| {
                json!({
                    "handler": step.handler,
                    "priority": step.priority,
                    "verdict": step.verdict.as_str(),
                })
            })
            .collect();
        let value = json!({
            "flag": ctx.flag().to_string(),
            "regions": args.regions.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "steps": steps,
            "decided_by": explanation.decided_by,
            "result": explanation.result.as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    output::header(&format!("Evaluating {}", ctx.flag()));
    if args.regions.is_empty() {
        println!("  Regions: {}", "(none, global handler only)".dimmed());
    } else {
        let regions: Vec<String> = args.regions.iter().map(ToString::to_string).collect();
        println!("  Regions: {}", regions.join(", "));
    }
    if let Some(actor) = ctx.actor() {
        println!("  Actor:   {actor}");
    }
    println!();

    for step in &explanation.steps {
        println!(
            "  {:>11}  {:<24} {}",
            step.priority,
            step.handler,
            output::verdict(step.verdict)
        );
    }
    println!();
    match &explanation.decided_by {
        Some(handler) => println!(
            "Result: {} (decided by {})",
            output::verdict(explanation.result),
            handler.bold()
        ),
        None => println!(
            "Result: {} (no handler decided, default applied)",
            output::verdict(explanation.result)
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_nodes_ignores_subject_and_world() {
        let grants = GrantedNodes(["regionward.handler.perms.build".to_string()].into_iter().collect());
        let alice = UserId::new("alice".to_string()).unwrap();
        assert!(grants.has_permission(Some(&alice), "regionward.handler.perms.build", Some("nether")));
        assert!(grants.has_permission(None, "regionward.handler.perms.build", None));
        assert!(!grants.has_permission(Some(&alice), "regionward.handler.perms.enter", None));
    }
}
