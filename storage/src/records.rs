//! Structured, fully-read form of a persisted handler.
//!
//! Rows are kept as raw strings so that a record can represent whatever is
//! in the database, including values that no longer parse. Interpretation
//! happens in [`crate::factory`].

use policy::{FlagRole, Handler};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ward_core::{GLOBAL_HANDLER_NAME, HandlerKind, is_valid_handler_name};

/// Settings key holding a simple handler's [`ward_core::PassiveOptions`].
pub const PASSIVE_SETTING: &str = "passive";

/// One row of the `handlers` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerMeta {
    pub name: String,
    pub kind: String,
    pub priority: i32,
    pub enabled: bool,
}

/// A `handlers` row whose columns do not decode, with every column read
/// back as text. `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHandlerRow {
    pub name: String,
    pub kind: Option<String>,
    pub priority: Option<String>,
    pub enabled: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlagRow {
    pub role: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRecord {
    pub meta: HandlerMeta,
    pub owners: Vec<String>,
    pub members: Vec<String>,
    pub settings: Vec<SettingRow>,
    pub flags: Vec<FlagRow>,
}

/// Why a record does not describe a handler of its declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("unknown handler kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("name '{name}' is not valid for a {kind} handler")]
    NameMismatch { name: String, kind: HandlerKind },

    #[error("{kind} handlers have no owners")]
    OwnersOnKind { kind: HandlerKind },

    #[error("{kind} handlers have no members")]
    MembersOnKind { kind: HandlerKind },

    #[error("{kind} handlers have no settings")]
    SettingsOnKind { kind: HandlerKind },

    #[error("flag role '{role}' does not belong to a {kind} handler")]
    UnexpectedRole { role: String, kind: HandlerKind },

    #[error("handler row cannot be read: {reason}")]
    UnreadableRow { reason: String },
}

impl HandlerRecord {
    /// Snapshot of a live handler, as it would be written.
    pub fn from_handler(handler: &Handler) -> Self {
        let kind = handler.kind();
        let meta = HandlerMeta {
            name: handler.name().to_string(),
            kind: kind.to_string(),
            priority: handler.priority(),
            enabled: handler.is_enabled(),
        };

        let owners = handler
            .owners()
            .map(|users| users.iter().map(|u| u.as_str().to_string()).collect())
            .unwrap_or_default();
        let members = handler
            .members()
            .map(|users| users.iter().map(|u| u.as_str().to_string()).collect())
            .unwrap_or_default();

        let settings = match handler {
            Handler::Simple(simple) => vec![SettingRow {
                key: PASSIVE_SETTING.to_string(),
                value: simple.passive_option().to_string(),
            }],
            _ => Vec::new(),
        };

        let mut flags = Vec::new();
        for role in FlagRole::for_kind(kind) {
            let Some(map) = handler.flag_map(*role) else {
                continue;
            };
            flags.extend(map.entries().into_iter().map(|(flag, value)| FlagRow {
                role: role.to_string(),
                key: flag.to_string(),
                value: value.as_str().to_string(),
            }));
        }

        Self {
            meta,
            owners,
            members,
            settings,
            flags,
        }
    }

    /// Declared kind, if it is one the engine knows.
    pub fn kind(&self) -> Option<HandlerKind> {
        self.meta.kind.parse().ok()
    }

    /// Checks that the record's rows fit its declared kind and name.
    ///
    /// Individual flag keys and values are not checked here; bad ones are
    /// skipped row by row when the handler is built.
    pub fn check(&self) -> Result<HandlerKind, Corruption> {
        let kind = self.kind().ok_or_else(|| Corruption::UnknownKind {
            kind: self.meta.kind.clone(),
        })?;

        let name_ok = match kind {
            HandlerKind::Global => self.meta.name == GLOBAL_HANDLER_NAME,
            _ => is_valid_handler_name(&self.meta.name),
        };
        if !name_ok {
            return Err(Corruption::NameMismatch {
                name: self.meta.name.clone(),
                kind,
            });
        }

        if !self.owners.is_empty()
            && matches!(kind, HandlerKind::Permission | HandlerKind::Global)
        {
            return Err(Corruption::OwnersOnKind { kind });
        }
        if kind != HandlerKind::Simple {
            if !self.members.is_empty() {
                return Err(Corruption::MembersOnKind { kind });
            }
            if !self.settings.is_empty() {
                return Err(Corruption::SettingsOnKind { kind });
            }
        }

        let roles = FlagRole::for_kind(kind);
        if let Some(row) = self.flags.iter().find(|row| {
            !row.role
                .parse::<FlagRole>()
                .is_ok_and(|role| roles.contains(&role))
        }) {
            return Err(Corruption::UnexpectedRole {
                role: row.role.clone(),
                kind,
            });
        }

        Ok(kind)
    }
}
