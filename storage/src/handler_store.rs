//! SQLite persistence for handlers and region links.
//!
//! Every handler is read in one transaction into a [`HandlerRecord`] and only
//! then handed to the factory, so a failed read never produces a half-built
//! handler. Writes replace all rows of a handler inside one transaction.

use crate::factory::HandlerFactory;
use crate::records::{Corruption, FlagRow, HandlerMeta, HandlerRecord, RawHandlerRow, SettingRow};
use chrono::Utc;
use config::StorageConfig;
use errors::HandlerError;
use policy::{Handler, LinkGraph, PolicyManager};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use ward_core::RegionId;

#[derive(Error, Debug)]
pub enum HandlerStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS handlers (
        name TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        priority INTEGER NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS handler_owners (
        handler TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (handler, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS handler_members (
        handler TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (handler, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS handler_settings (
        handler TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (handler, key)
    )",
    "CREATE TABLE IF NOT EXISTS handler_flags (
        handler TEXT NOT NULL,
        role TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (handler, role, key)
    )",
    "CREATE TABLE IF NOT EXISTS region_links (
        region TEXT NOT NULL,
        world TEXT NOT NULL DEFAULT '',
        handler TEXT NOT NULL,
        PRIMARY KEY (region, world, handler)
    )",
    "CREATE INDEX IF NOT EXISTS idx_region_links_handler ON region_links(handler)",
    "CREATE TABLE IF NOT EXISTS quarantined_handlers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        reason TEXT NOT NULL,
        record_json TEXT NOT NULL,
        quarantined_at TEXT NOT NULL
    )",
];

/// Typed columns plus a text rendering of each, so that a row whose typed
/// columns fail to decode can still be reported and quarantined.
const SCAN_HANDLERS: &str = "SELECT name, kind, priority, enabled,
        COALESCE(CAST(name AS TEXT), '') AS raw_name,
        CAST(kind AS TEXT) AS raw_kind,
        CAST(priority AS TEXT) AS raw_priority,
        CAST(enabled AS TEXT) AS raw_enabled
    FROM handlers ORDER BY raw_name";

const SCAN_LINKS: &str = "SELECT rowid AS link_id, region, world, handler
    FROM region_links ORDER BY region, world, handler";

const DELETE_HANDLER_ROWS: &[&str] = &[
    "DELETE FROM handler_owners WHERE handler = ?",
    "DELETE FROM handler_members WHERE handler = ?",
    "DELETE FROM handler_settings WHERE handler = ?",
    "DELETE FROM handler_flags WHERE handler = ?",
];

/// Result of loading a single handler.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Handler),
    /// Corrupted, but rebuilt because `force_load` is set.
    Forced { handler: Handler, reason: Corruption },
    /// Corrupted and not loaded.
    Corrupted {
        reason: Corruption,
        purged: bool,
        quarantined: bool,
    },
    /// The handler row disappeared before it could be read.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptedHandler {
    pub name: String,
    pub reason: Corruption,
    pub purged: bool,
    pub quarantined: bool,
}

/// What [`HandlerStore::load_all`] did.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub forced: Vec<(String, Corruption)>,
    pub corrupted: Vec<CorruptedHandler>,
    /// Built fine but refused by the manager.
    pub rejected: Vec<(String, HandlerError)>,
    pub global_loaded: bool,
    pub links_loaded: usize,
    /// Links to unknown handlers left in the store.
    pub links_skipped: usize,
    /// Link rows whose columns do not decode, purged or not.
    pub links_unreadable: usize,
    /// Dangling and unreadable link rows deleted.
    pub links_purged: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.forced.is_empty()
            && self.corrupted.is_empty()
            && self.rejected.is_empty()
            && self.links_skipped == 0
            && self.links_unreadable == 0
            && self.links_purged == 0
    }
}

/// One row of the `handlers` table as scanned.
enum ScannedMeta {
    Readable(HandlerMeta),
    Unreadable { raw: RawHandlerRow, reason: Corruption },
}

/// A row of the quarantine table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedHandler {
    pub id: i64,
    pub name: String,
    pub reason: String,
    pub record_json: String,
    pub quarantined_at: String,
}

impl QuarantinedHandler {
    pub fn record(&self) -> Result<HandlerRecord, serde_json::Error> {
        serde_json::from_str(&self.record_json)
    }

    /// The raw row, for entries quarantined because the row did not decode.
    pub fn raw_row(&self) -> Result<RawHandlerRow, serde_json::Error> {
        serde_json::from_str(&self.record_json)
    }
}

pub struct HandlerStore {
    pool: SqlitePool,
    policy: StorageConfig,
}

impl HandlerStore {
    pub fn new(pool: SqlitePool, policy: StorageConfig) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn policy(&self) -> &StorageConfig {
        &self.policy
    }

    pub async fn initialize_schema(&self) -> Result<(), HandlerStoreError> {
        for &statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Every readable row of the `handlers` table, by name.
    #[instrument(skip(self))]
    pub async fn list_metas(&self) -> Result<Vec<HandlerMeta>, HandlerStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(scan_handlers(&mut conn)
            .await?
            .into_iter()
            .filter_map(|scanned| match scanned {
                ScannedMeta::Readable(meta) => Some(meta),
                ScannedMeta::Unreadable { .. } => None,
            })
            .collect())
    }

    /// Rows of the `handlers` table whose columns do not decode.
    pub async fn list_unreadable(&self) -> Result<Vec<(RawHandlerRow, Corruption)>, HandlerStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(scan_handlers(&mut conn)
            .await?
            .into_iter()
            .filter_map(|scanned| match scanned {
                ScannedMeta::Readable(_) => None,
                ScannedMeta::Unreadable { raw, reason } => Some((raw, reason)),
            })
            .collect())
    }

    /// Reads a handler and all of its child rows in one transaction.
    #[instrument(skip(self))]
    pub async fn fetch_record(&self, name: &str) -> Result<Option<HandlerRecord>, HandlerStoreError> {
        let mut tx = self.pool.begin().await?;
        let record = read_record(&mut tx, name).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Loads one handler, applying the corruption policy.
    #[instrument(skip(self, meta), fields(handler = %meta.name))]
    pub async fn load_handler(&self, meta: &HandlerMeta) -> Result<LoadOutcome, HandlerStoreError> {
        let Some(record) = self.fetch_record(&meta.name).await? else {
            return Ok(LoadOutcome::Missing);
        };

        match HandlerFactory::from_record(&record, self.policy.force_load) {
            Ok(handler) => Ok(match record.check() {
                Ok(_) => LoadOutcome::Loaded(handler),
                Err(reason) => LoadOutcome::Forced { handler, reason },
            }),
            Err(reason) => {
                warn!(reason = %reason, "corrupted handler not loaded");
                if self.policy.purge_corrupted {
                    let record_json = serde_json::to_string(&record)?;
                    let quarantined = self.purge(&record.meta.name, &reason, &record_json).await?;
                    Ok(LoadOutcome::Corrupted {
                        reason,
                        purged: true,
                        quarantined,
                    })
                } else {
                    Ok(LoadOutcome::Corrupted {
                        reason,
                        purged: false,
                        quarantined: false,
                    })
                }
            }
        }
    }

    /// Replaces every stored row of `handler`. Links are left alone.
    #[instrument(skip(self, handler), fields(handler = %handler.name()))]
    pub async fn save_handler(&self, handler: &Handler) -> Result<(), HandlerStoreError> {
        let record = HandlerRecord::from_handler(handler);
        let mut tx = self.pool.begin().await?;
        write_record(&mut tx, &record).await?;
        tx.commit().await?;
        debug!("handler saved");
        Ok(())
    }

    /// Deletes a handler and its links. `false` if it was not stored.
    #[instrument(skip(self))]
    pub async fn delete_handler(&self, name: &str) -> Result<bool, HandlerStoreError> {
        let mut tx = self.pool.begin().await?;
        let existed = delete_record(&mut tx, name).await?;
        delete_links_of(&mut tx, name).await?;
        tx.commit().await?;
        Ok(existed)
    }

    /// Copies `record` into the quarantine table.
    #[instrument(skip(self, record), fields(handler = %record.meta.name))]
    pub async fn quarantine(
        &self,
        record: &HandlerRecord,
        reason: &Corruption,
    ) -> Result<(), HandlerStoreError> {
        let record_json = serde_json::to_string(record)?;
        let mut conn = self.pool.acquire().await?;
        insert_quarantine(&mut conn, &record.meta.name, reason, &record_json).await
    }

    pub async fn list_quarantined(&self) -> Result<Vec<QuarantinedHandler>, HandlerStoreError> {
        let rows = sqlx::query(
            "SELECT id, name, reason, record_json, quarantined_at
             FROM quarantined_handlers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(QuarantinedHandler {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                reason: row.try_get("reason")?,
                record_json: row.try_get("record_json")?,
                quarantined_at: row.try_get("quarantined_at")?,
            });
        }
        Ok(entries)
    }

    /// Replaces the stored link set with `graph`.
    #[instrument(skip(self, graph), fields(links = graph.len()))]
    pub async fn save_links(&self, graph: &LinkGraph) -> Result<(), HandlerStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM region_links")
            .execute(&mut *tx)
            .await?;
        for (region, handler) in graph.pairs() {
            insert_link(&mut tx, region, handler).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Stores a single link, leaving every other row alone. `false` if it
    /// was already stored.
    #[instrument(skip(self, region), fields(region = %region))]
    pub async fn add_link(&self, region: &RegionId, handler: &str) -> Result<bool, HandlerStoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_link(&mut conn, region, handler).await
    }

    /// Deletes a single link. `false` if it was not stored.
    #[instrument(skip(self, region), fields(region = %region))]
    pub async fn remove_link(&self, region: &RegionId, handler: &str) -> Result<bool, HandlerStoreError> {
        let mut conn = self.pool.acquire().await?;
        delete_link(&mut conn, region, handler).await
    }

    /// Every readable stored link.
    pub async fn load_links(&self) -> Result<Vec<(RegionId, String)>, HandlerStoreError> {
        let mut conn = self.pool.acquire().await?;
        let (links, _) = scan_links(&mut conn).await?;
        Ok(links)
    }

    /// Loads every stored handler and link into `manager`.
    ///
    /// All reads (and any purging) happen before `manager` is touched, so a
    /// database error leaves it unchanged.
    #[instrument(skip(self, manager))]
    pub async fn load_all(&self, manager: &mut PolicyManager) -> Result<LoadReport, HandlerStoreError> {
        let mut report = LoadReport::default();
        let mut handlers = Vec::new();

        let scanned = {
            let mut conn = self.pool.acquire().await?;
            scan_handlers(&mut conn).await?
        };
        for scanned in scanned {
            let meta = match scanned {
                ScannedMeta::Readable(meta) => meta,
                ScannedMeta::Unreadable { raw, reason } => {
                    report.corrupted.push(self.drop_unreadable(raw, reason).await?);
                    continue;
                }
            };
            match self.load_handler(&meta).await? {
                LoadOutcome::Loaded(handler) => handlers.push(handler),
                LoadOutcome::Forced { handler, reason } => {
                    report.forced.push((meta.name, reason));
                    handlers.push(handler);
                }
                LoadOutcome::Corrupted {
                    reason,
                    purged,
                    quarantined,
                } => report.corrupted.push(CorruptedHandler {
                    name: meta.name,
                    reason,
                    purged,
                    quarantined,
                }),
                LoadOutcome::Missing => {}
            }
        }

        let known: HashSet<String> = handlers
            .iter()
            .filter(|handler| !matches!(handler, Handler::Global(_)))
            .map(|handler| handler.name().to_string())
            .collect();
        let (readable, unreadable) = {
            let mut conn = self.pool.acquire().await?;
            scan_links(&mut conn).await?
        };
        let (links, dangling): (Vec<_>, Vec<_>) = readable
            .into_iter()
            .partition(|(_, handler)| known.contains(handler));

        report.links_unreadable = unreadable.len();
        if !unreadable.is_empty() {
            warn!(count = unreadable.len(), "unreadable link rows");
        }
        if !dangling.is_empty() {
            warn!(count = dangling.len(), "links to unknown handlers");
        }
        if self.policy.purge_corrupted {
            if !dangling.is_empty() || !unreadable.is_empty() {
                let mut tx = self.pool.begin().await?;
                for (region, handler) in &dangling {
                    delete_link(&mut tx, region, handler).await?;
                }
                for &link_id in &unreadable {
                    sqlx::query("DELETE FROM region_links WHERE rowid = ?")
                        .bind(link_id)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
                report.links_purged = dangling.len() + unreadable.len();
            }
        } else {
            report.links_skipped = dangling.len();
        }

        for handler in handlers {
            match handler {
                Handler::Global(global) => {
                    manager.replace_global(global);
                    report.global_loaded = true;
                }
                handler => {
                    let name = handler.name().to_string();
                    match manager.add_handler(handler) {
                        Ok(()) => report.loaded.push(name),
                        Err(e) => {
                            warn!(handler = %name, error = %e, "handler rejected");
                            report.rejected.push((name, e));
                        }
                    }
                }
            }
        }

        for (region, handler) in &links {
            if manager.link(region, handler) {
                report.links_loaded += 1;
            } else {
                report.links_skipped += 1;
            }
        }

        info!(
            handlers = report.loaded.len(),
            corrupted = report.corrupted.len(),
            links = report.links_loaded,
            "handlers loaded"
        );
        Ok(report)
    }

    /// Writes every handler (including the global one) and the link graph of
    /// `manager` in one transaction, removing stored handlers the manager no
    /// longer has.
    ///
    /// A stored handler whose record is corrupted is only removed when
    /// `purge_corrupted` is set, after being quarantined when
    /// `quarantine_corrupted` is set.
    #[instrument(skip(self, manager))]
    pub async fn save_all(&self, manager: &PolicyManager) -> Result<(), HandlerStoreError> {
        let live: Vec<&Handler> = manager
            .handlers()
            .into_iter()
            .chain(std::iter::once(manager.global()))
            .collect();
        let live_names: HashSet<&str> = live.iter().map(|handler| handler.name()).collect();

        let mut tx = self.pool.begin().await?;

        for scanned in scan_handlers(&mut tx).await? {
            let (name, corruption) = match scanned {
                ScannedMeta::Readable(meta) => {
                    if live_names.contains(meta.name.as_str()) {
                        continue;
                    }
                    let Some(record) = read_record(&mut tx, &meta.name).await? else {
                        continue;
                    };
                    let corruption = match record.check() {
                        Ok(_) => None,
                        Err(reason) => Some((reason, serde_json::to_string(&record)?)),
                    };
                    (meta.name, corruption)
                }
                // A live handler of the same name overwrites the row below.
                ScannedMeta::Unreadable { raw, .. } if live_names.contains(raw.name.as_str()) => {
                    continue;
                }
                ScannedMeta::Unreadable { raw, reason } => {
                    let raw_json = serde_json::to_string(&raw)?;
                    (raw.name, Some((reason, raw_json)))
                }
            };
            if let Some((reason, record_json)) = corruption {
                if !self.policy.purge_corrupted {
                    debug!(handler = %name, reason = %reason, "keeping corrupted handler");
                    continue;
                }
                if self.policy.quarantine_corrupted {
                    insert_quarantine(&mut tx, &name, &reason, &record_json).await?;
                }
            }
            delete_record(&mut tx, &name).await?;
            delete_links_of(&mut tx, &name).await?;
            debug!(handler = %name, "removed stale handler");
        }

        for handler in &live {
            write_record(&mut tx, &HandlerRecord::from_handler(handler)).await?;
            delete_links_of(&mut tx, handler.name()).await?;
        }
        for (region, handler) in manager.link_graph().pairs() {
            insert_link(&mut tx, region, handler).await?;
        }

        tx.commit().await?;
        info!(
            handlers = manager.len(),
            links = manager.link_graph().len(),
            "handlers saved"
        );
        Ok(())
    }

    /// Quarantines (when configured) and deletes a corrupted handler in one
    /// transaction. Returns whether it was quarantined.
    async fn purge(
        &self,
        name: &str,
        reason: &Corruption,
        record_json: &str,
    ) -> Result<bool, HandlerStoreError> {
        let mut tx = self.pool.begin().await?;
        let quarantined = self.policy.quarantine_corrupted;
        if quarantined {
            insert_quarantine(&mut tx, name, reason, record_json).await?;
        }
        delete_record(&mut tx, name).await?;
        delete_links_of(&mut tx, name).await?;
        tx.commit().await?;
        info!(handler = %name, quarantined, "purged corrupted handler");
        Ok(quarantined)
    }

    /// A `handlers` row that cannot even be read is never loaded, forced or
    /// not. It is purged under `purge_corrupted` like any other corruption.
    async fn drop_unreadable(
        &self,
        raw: RawHandlerRow,
        reason: Corruption,
    ) -> Result<CorruptedHandler, HandlerStoreError> {
        warn!(handler = %raw.name, reason = %reason, "unreadable handler row not loaded");
        let (purged, quarantined) = if self.policy.purge_corrupted {
            let raw_json = serde_json::to_string(&raw)?;
            (true, self.purge(&raw.name, &reason, &raw_json).await?)
        } else {
            (false, false)
        };
        Ok(CorruptedHandler {
            name: raw.name,
            reason,
            purged,
            quarantined,
        })
    }
}

fn meta_from_row(row: &SqliteRow) -> Result<HandlerMeta, sqlx::Error> {
    Ok(HandlerMeta {
        name: row.try_get("name")?,
        kind: row.try_get("kind")?,
        priority: row.try_get("priority")?,
        enabled: row.try_get("enabled")?,
    })
}

fn raw_meta_from_row(row: &SqliteRow) -> Result<RawHandlerRow, sqlx::Error> {
    Ok(RawHandlerRow {
        name: row.try_get("raw_name")?,
        kind: row.try_get("raw_kind")?,
        priority: row.try_get("raw_priority")?,
        enabled: row.try_get("raw_enabled")?,
    })
}

async fn scan_handlers(conn: &mut SqliteConnection) -> Result<Vec<ScannedMeta>, HandlerStoreError> {
    let rows = sqlx::query(SCAN_HANDLERS).fetch_all(&mut *conn).await?;
    let mut scanned = Vec::with_capacity(rows.len());
    for row in &rows {
        match meta_from_row(row) {
            Ok(meta) => scanned.push(ScannedMeta::Readable(meta)),
            Err(e) => {
                let raw = raw_meta_from_row(row)?;
                debug!(handler = %raw.name, error = %e, "unreadable handler row");
                scanned.push(ScannedMeta::Unreadable {
                    raw,
                    reason: Corruption::UnreadableRow {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }
    Ok(scanned)
}

/// Readable links, plus the row ids of link rows that do not decode or name
/// no region.
async fn scan_links(
    conn: &mut SqliteConnection,
) -> Result<(Vec<(RegionId, String)>, Vec<i64>), HandlerStoreError> {
    let rows = sqlx::query(SCAN_LINKS).fetch_all(&mut *conn).await?;
    let mut links = Vec::with_capacity(rows.len());
    let mut unreadable = Vec::new();
    for row in &rows {
        match link_from_row(row) {
            Ok(Some(link)) => links.push(link),
            Ok(None) => {
                debug!("link with empty region name");
                unreadable.push(row.try_get("link_id")?);
            }
            Err(e) => {
                debug!(error = %e, "unreadable link row");
                unreadable.push(row.try_get("link_id")?);
            }
        }
    }
    Ok((links, unreadable))
}

fn link_from_row(row: &SqliteRow) -> Result<Option<(RegionId, String)>, sqlx::Error> {
    let region: String = row.try_get("region")?;
    let world: String = row.try_get("world")?;
    let handler: String = row.try_get("handler")?;
    if region.is_empty() {
        return Ok(None);
    }
    let region = if world.is_empty() {
        RegionId::new(region)
    } else {
        RegionId::in_world(region, world)
    };
    Ok(Some((region, handler)))
}

/// Single-column string rows, skipping any that do not read as text.
fn strings(rows: &[SqliteRow], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|row| match row.try_get::<String, _>(column) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(column, error = %e, "skipping unreadable row");
                None
            }
        })
        .collect()
}

async fn read_record(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<HandlerRecord>, HandlerStoreError> {
    let Some(row) = sqlx::query("SELECT name, kind, priority, enabled FROM handlers WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };
    let meta = meta_from_row(&row)?;

    let owners = sqlx::query("SELECT user_id FROM handler_owners WHERE handler = ? ORDER BY user_id")
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    let members =
        sqlx::query("SELECT user_id FROM handler_members WHERE handler = ? ORDER BY user_id")
            .bind(name)
            .fetch_all(&mut *conn)
            .await?;

    let settings = sqlx::query("SELECT key, value FROM handler_settings WHERE handler = ? ORDER BY key")
        .bind(name)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .filter_map(|row| {
            Some(SettingRow {
                key: row.try_get("key").ok()?,
                value: row.try_get("value").ok()?,
            })
        })
        .collect();

    let flags = sqlx::query(
        "SELECT role, key, value FROM handler_flags WHERE handler = ? ORDER BY role, key",
    )
    .bind(name)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .filter_map(|row| {
        Some(FlagRow {
            role: row.try_get("role").ok()?,
            key: row.try_get("key").ok()?,
            value: row.try_get("value").ok()?,
        })
    })
    .collect();

    Ok(Some(HandlerRecord {
        meta,
        owners: strings(&owners, "user_id"),
        members: strings(&members, "user_id"),
        settings,
        flags,
    }))
}

async fn write_record(
    conn: &mut SqliteConnection,
    record: &HandlerRecord,
) -> Result<(), HandlerStoreError> {
    let name = record.meta.name.as_str();
    for &statement in DELETE_HANDLER_ROWS {
        sqlx::query(statement).bind(name).execute(&mut *conn).await?;
    }

    sqlx::query(
        "INSERT INTO handlers (name, kind, priority, enabled) VALUES (?, ?, ?, ?)
         ON CONFLICT (name) DO UPDATE SET
            kind = excluded.kind,
            priority = excluded.priority,
            enabled = excluded.enabled",
    )
    .bind(name)
    .bind(record.meta.kind.as_str())
    .bind(record.meta.priority)
    .bind(record.meta.enabled)
    .execute(&mut *conn)
    .await?;

    for owner in &record.owners {
        sqlx::query("INSERT INTO handler_owners (handler, user_id) VALUES (?, ?)")
            .bind(name)
            .bind(owner.as_str())
            .execute(&mut *conn)
            .await?;
    }
    for member in &record.members {
        sqlx::query("INSERT INTO handler_members (handler, user_id) VALUES (?, ?)")
            .bind(name)
            .bind(member.as_str())
            .execute(&mut *conn)
            .await?;
    }
    for setting in &record.settings {
        sqlx::query("INSERT INTO handler_settings (handler, key, value) VALUES (?, ?, ?)")
            .bind(name)
            .bind(setting.key.as_str())
            .bind(setting.value.as_str())
            .execute(&mut *conn)
            .await?;
    }
    for flag in &record.flags {
        sqlx::query("INSERT INTO handler_flags (handler, role, key, value) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(flag.role.as_str())
            .bind(flag.key.as_str())
            .bind(flag.value.as_str())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Deletes the handler row and its child rows. Returns whether the handler
/// row existed.
async fn delete_record(conn: &mut SqliteConnection, name: &str) -> Result<bool, HandlerStoreError> {
    for &statement in DELETE_HANDLER_ROWS {
        sqlx::query(statement).bind(name).execute(&mut *conn).await?;
    }
    let result = sqlx::query("DELETE FROM handlers WHERE name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn delete_links_of(conn: &mut SqliteConnection, handler: &str) -> Result<(), HandlerStoreError> {
    sqlx::query("DELETE FROM region_links WHERE handler = ?")
        .bind(handler)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns whether a row was inserted.
async fn insert_link(
    conn: &mut SqliteConnection,
    region: &RegionId,
    handler: &str,
) -> Result<bool, HandlerStoreError> {
    let result =
        sqlx::query("INSERT OR IGNORE INTO region_links (region, world, handler) VALUES (?, ?, ?)")
            .bind(region.name.as_str())
            .bind(region.world.as_deref().unwrap_or_default())
            .bind(handler)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns whether a row was deleted.
async fn delete_link(
    conn: &mut SqliteConnection,
    region: &RegionId,
    handler: &str,
) -> Result<bool, HandlerStoreError> {
    let result = sqlx::query("DELETE FROM region_links WHERE region = ? AND world = ? AND handler = ?")
        .bind(region.name.as_str())
        .bind(region.world.as_deref().unwrap_or_default())
        .bind(handler)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_quarantine(
    conn: &mut SqliteConnection,
    name: &str,
    reason: &Corruption,
    record_json: &str,
) -> Result<(), HandlerStoreError> {
    sqlx::query(
        "INSERT INTO quarantined_handlers (name, reason, record_json, quarantined_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(reason.to_string())
    .bind(record_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
