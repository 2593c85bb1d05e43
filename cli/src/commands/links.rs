use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use config::Config;
use errors::HandlerError;
use serde_json::json;
use ward_core::{GLOBAL_HANDLER_NAME, RegionId};

use super::Session;
use crate::output;

#[derive(Subcommand)]
pub enum LinksCommand {
    #[command(about = "List stored region-handler links")]
    List(ListArgs),

    #[command(about = "Link a handler to a region")]
    Add(LinkArgs),

    #[command(about = "Unlink a handler from a region")]
    Remove(LinkArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Only links of this region (`name` or `name@world`)
    #[arg(long)]
    pub region: Option<RegionId>,

    /// Only links of this handler
    #[arg(long)]
    pub handler: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct LinkArgs {
    /// Region as `name` or `name@world`
    pub region: RegionId,

    /// Handler name
    pub handler: String,
}

pub async fn run(cmd: LinksCommand, config: Config) -> Result<()> {
    match cmd {
        LinksCommand::List(args) => run_list(args, config).await,
        LinksCommand::Add(args) => run_add(args, config).await,
        LinksCommand::Remove(args) => run_remove(args, config).await,
    }
}

async fn run_list(args: ListArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let links: Vec<(RegionId, String)> = session
        .store
        .load_links()
        .await?
        .into_iter()
        .filter(|(region, _)| args.region.as_ref().is_none_or(|wanted| wanted == region))
        .filter(|(_, handler)| args.handler.as_ref().is_none_or(|wanted| wanted == handler))
        .collect();

    if args.json {
        let entries: Vec<_> = links
            .iter()
            .map(|(region, handler)| {
                json!({
                    "region": region.name,
                    "world": region.world,
                    "handler": handler,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if links.is_empty() {
        output::info("No links found");
        return Ok(());
    }

    output::header("Links");
    for (region, handler) in &links {
        println!("  {:<32} {}", region.to_string(), handler.bold());
    }
    println!();
    println!("{} link(s)", links.len());
    Ok(())
}

async fn run_add(args: LinkArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    if args.handler == GLOBAL_HANDLER_NAME {
        bail!(HandlerError::global("linking"));
    }
    if session.store.fetch_record(&args.handler).await?.is_none() {
        bail!(HandlerError::NotFound { name: args.handler });
    }

    if !session.store.add_link(&args.region, &args.handler).await? {
        output::warn(&format!(
            "{} is already linked to {}",
            args.handler, args.region
        ));
        return Ok(());
    }
    output::success(&format!(
        "Linked {} to {}",
        args.handler.bold(),
        args.region
    ));
    Ok(())
}

async fn run_remove(args: LinkArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    if !session.store.remove_link(&args.region, &args.handler).await? {
        bail!("{} is not linked to {}", args.handler, args.region);
    }
    output::success(&format!(
        "Unlinked {} from {}",
        args.handler.bold(),
        args.region
    ));
    Ok(())
}
