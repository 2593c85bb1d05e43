//! Handler commands
//!
//! `list` and `show` read rows as stored and never purge; `create`, `delete`
//! and `flag` write through the store one handler at a time.

use anyhow::{Result, anyhow, bail};
use clap::{Args, Subcommand};
use colored::Colorize;
use errors::HandlerError;
use policy::{FlagRole, GlobalHandler, Handler};
use serde_json::json;
use storage::{HandlerFactory, HandlerRecord, HandlerStore};
use ward_core::{Flag, GLOBAL_HANDLER_NAME, Tristate, UserId};

use super::Session;
use crate::output;
use config::Config;

#[derive(Subcommand)]
pub enum HandlersCommand {
    #[command(about = "List stored handlers")]
    List(ListArgs),

    #[command(about = "Show everything stored about one handler")]
    Show(ShowArgs),

    #[command(about = "List creatable handler types and their aliases")]
    Types,

    #[command(about = "Create a handler")]
    Create(CreateArgs),

    #[command(about = "Delete a handler and its links")]
    Delete(DeleteArgs),

    #[command(about = "Set or clear one flag of a handler")]
    Flag(FlagArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Handler name
    pub name: String,

    /// Print the raw stored record as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Handler name
    pub name: String,

    /// Handler type or alias (see `wardctl handlers types`)
    #[arg(short = 't', long = "type", default_value = "simple")]
    pub type_alias: String,

    /// Priority; higher is consulted first
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    /// Creation arguments as `key=value` pairs, e.g. "enabled=false passive=DISALLOW"
    #[arg(long, default_value = "")]
    pub args: String,

    /// User recorded as the first owner
    #[arg(long)]
    pub owner: Option<UserId>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Handler name
    pub name: String,
}

#[derive(Args)]
pub struct FlagArgs {
    /// Handler name (`_global` for the global handler)
    pub name: String,

    /// Flag map: owner, member, default (simple handlers) or flags (passive and global)
    pub role: FlagRole,

    /// Flag name, e.g. BUILD or FIRE_SPREAD
    pub flag: Flag,

    /// allow, deny or undefined; omit to remove the explicit entry
    pub value: Option<Tristate>,
}

pub async fn run(cmd: HandlersCommand, config: Config) -> Result<()> {
    match cmd {
        HandlersCommand::List(args) => run_list(args, config).await,
        HandlersCommand::Show(args) => run_show(args, config).await,
        HandlersCommand::Types => {
            run_types();
            Ok(())
        }
        HandlersCommand::Create(args) => run_create(args, config).await,
        HandlersCommand::Delete(args) => run_delete(args, config).await,
        HandlersCommand::Flag(args) => run_flag(args, config).await,
    }
}

async fn run_list(args: ListArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let store = &session.store;
    let links = store.load_links().await?;

    let mut rows = Vec::new();
    for meta in store.list_metas().await? {
        let Some(record) = store.fetch_record(&meta.name).await? else {
            continue;
        };
        let status = record.check().err().map(|reason| reason.to_string());
        let link_count = links
            .iter()
            .filter(|(_, handler)| *handler == meta.name)
            .count();
        rows.push((record, status, link_count));
    }

    if args.json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(record, status, link_count)| {
                json!({
                    "name": record.meta.name,
                    "kind": record.meta.kind,
                    "priority": record.meta.priority,
                    "enabled": record.meta.enabled,
                    "owners": record.owners.len(),
                    "members": record.members.len(),
                    "links": link_count,
                    "corruption": status,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if rows.is_empty() {
        output::info("No handlers stored");
        output::hint("Create one with `wardctl handlers create <NAME>`");
        return Ok(());
    }

    output::header("Handlers");
    println!(
        "  {:<24} {:<11} {:>11}  {:<8}  {:>5}",
        "NAME", "TYPE", "PRIORITY", "STATE", "LINKS"
    );
    for (record, status, link_count) in &rows {
        let meta = &record.meta;
        println!(
            "  {:<24} {:<11} {:>11}  {:<8}  {:>5}",
            meta.name,
            meta.kind,
            meta.priority,
            output::enabled(meta.enabled),
            link_count
        );
        if let Some(reason) = status {
            println!("    {} {}", "corrupted:".red().bold(), reason);
        }
    }
    println!();
    println!("{} handler(s)", rows.len());
    Ok(())
}

async fn run_show(args: ShowArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let store = &session.store;
    let Some(record) = store.fetch_record(&args.name).await? else {
        if args.name == GLOBAL_HANDLER_NAME {
            output::info("The global handler has not been stored yet; it has no explicit flags");
            return Ok(());
        }
        bail!(HandlerError::NotFound { name: args.name });
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let meta = &record.meta;
    output::header(&format!("Handler: {}", meta.name));
    println!("  Type:      {}", meta.kind);
    println!("  Priority:  {}", meta.priority);
    println!("  State:     {}", output::enabled(meta.enabled));
    match record.check() {
        Ok(_) => println!("  Integrity: {}", "ok".green()),
        Err(reason) => println!("  Integrity: {} ({})", "corrupted".red().bold(), reason),
    }

    print_users("Owners", &record.owners);
    print_users("Members", &record.members);

    if !record.settings.is_empty() {
        println!();
        output::subheader("Settings");
        for setting in &record.settings {
            println!("  {} = {}", setting.key, setting.value);
        }
    }

    print_flags(&record);

    let regions: Vec<String> = store
        .load_links()
        .await?
        .into_iter()
        .filter(|(_, handler)| *handler == meta.name)
        .map(|(region, _)| region.to_string())
        .collect();
    println!();
    output::subheader("Linked regions");
    if regions.is_empty() {
        println!("  {}", "(none)".dimmed());
    } else {
        for region in regions {
            println!("  {region}");
        }
    }
    Ok(())
}

fn print_users(title: &str, users: &[String]) {
    if users.is_empty() {
        return;
    }
    println!();
    output::subheader(title);
    for user in users {
        println!("  {user}");
    }
}

fn print_flags(record: &HandlerRecord) {
    if record.flags.is_empty() {
        return;
    }
    println!();
    output::subheader("Flags");
    let mut flags: Vec<_> = record.flags.iter().collect();
    flags.sort_by(|a, b| (&a.role, &a.key).cmp(&(&b.role, &b.key)));
    for row in flags {
        let value = match row.value.parse::<Tristate>() {
            Ok(value) => output::verdict(value).to_string(),
            Err(_) => format!("{} (unreadable)", row.value.red()),
        };
        println!("  {:<8} {:<18} {}", row.role, row.key, value);
    }
}

fn run_types() {
    output::header("Handler types");
    for kind in HandlerFactory::types() {
        println!(
            "  {:<11} {}",
            kind.to_string(),
            HandlerFactory::aliases(kind).join(", ").dimmed()
        );
    }
    output::hint("The global handler always exists and cannot be created");
}

async fn run_create(args: CreateArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    if session.store.fetch_record(&args.name).await?.is_some() {
        bail!(HandlerError::NameConflict { name: args.name });
    }

    let handler = HandlerFactory::create_handler(
        &args.name,
        &args.type_alias,
        args.priority,
        &args.args,
        args.owner.as_ref(),
    )?;
    session.store.save_handler(&handler).await?;
    output::success(&format!(
        "Created {} handler {} with priority {}",
        handler.kind(),
        handler.name().bold(),
        handler.priority()
    ));
    Ok(())
}

async fn run_delete(args: DeleteArgs, config: Config) -> Result<()> {
    if args.name == GLOBAL_HANDLER_NAME {
        bail!(HandlerError::global("removal"));
    }
    let session = Session::open(config).await?;
    if !session.store.delete_handler(&args.name).await? {
        bail!(HandlerError::NotFound { name: args.name });
    }
    output::success(&format!("Deleted handler {}", args.name.bold()));
    Ok(())
}

async fn run_flag(args: FlagArgs, config: Config) -> Result<()> {
    let session = Session::open(config).await?;
    let mut handler = load_handler(&session.store, &args.name).await?;
    let kind = handler.kind();
    let map = handler
        .flag_map_mut(args.role)
        .ok_or_else(|| anyhow!("{kind} handlers have no {} flag map", args.role))?;

    match args.value {
        Some(value) => {
            map.put(args.flag, value);
        }
        None => {
            map.remove(args.flag);
        }
    }
    session.store.save_handler(&handler).await?;

    let shown = args
        .value
        .map_or_else(|| "cleared".dimmed(), output::verdict);
    output::success(&format!(
        "{}: {} {} -> {}",
        args.name.bold(),
        args.role,
        args.flag,
        shown
    ));
    Ok(())
}

/// Rebuilds one stored handler. A missing global handler starts out empty.
async fn load_handler(store: &HandlerStore, name: &str) -> Result<Handler> {
    match store.fetch_record(name).await? {
        Some(record) => HandlerFactory::from_record(&record, false)
            .map_err(|reason| anyhow!("Handler {name} is corrupted: {reason}")),
        None if name == GLOBAL_HANDLER_NAME => Ok(GlobalHandler::new().into()),
        None => Err(HandlerError::NotFound {
            name: name.to_string(),
        }
        .into()),
    }
}
