//! Builds handlers from a type alias or from a persisted record.

use crate::records::{Corruption, HandlerRecord, PASSIVE_SETTING};
use errors::{FactoryError, HandlerError};
use policy::{FlagRole, GlobalHandler, Handler, PassiveHandler, PermissionHandler, SimpleHandler};
use std::collections::BTreeSet;
use ward_core::{
    Flag, FlagMap, HandlerKind, PassiveOptions, Tristate, UserId, is_valid_handler_name,
};

const SIMPLE_ALIASES: &[&str] = &["simple", "simp"];
const PASSIVE_ALIASES: &[&str] = &["passive", "pass"];
const PERMISSION_ALIASES: &[&str] = &["permission", "permissions", "perm", "perms"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerFactory;

impl HandlerFactory {
    /// Aliases accepted for `kind`. Empty for kinds that cannot be created.
    pub fn aliases(kind: HandlerKind) -> &'static [&'static str] {
        match kind {
            HandlerKind::Simple => SIMPLE_ALIASES,
            HandlerKind::Passive => PASSIVE_ALIASES,
            HandlerKind::Permission => PERMISSION_ALIASES,
            HandlerKind::Global => &[],
        }
    }

    /// Kinds that can be created on request.
    pub fn types() -> [HandlerKind; 3] {
        [
            HandlerKind::Simple,
            HandlerKind::Passive,
            HandlerKind::Permission,
        ]
    }

    /// Case-insensitive alias lookup.
    pub fn resolve_alias(alias: &str) -> Option<HandlerKind> {
        Self::types().into_iter().find(|kind| {
            Self::aliases(*kind)
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(alias))
        })
    }

    /// Creates a fresh handler of the type named by `type_alias`.
    ///
    /// `args` is a whitespace-separated list of `key=value` pairs:
    /// `enabled=<bool>` for every type, `passive=<option>` for simple
    /// handlers. The creator, if any, becomes the first owner of simple and
    /// passive handlers.
    pub fn create_handler(
        name: &str,
        type_alias: &str,
        priority: i32,
        args: &str,
        creator: Option<&UserId>,
    ) -> Result<Handler, FactoryError> {
        let kind = match Self::resolve_alias(type_alias) {
            Some(kind) => kind,
            None if type_alias.eq_ignore_ascii_case(&HandlerKind::Global.to_string()) => {
                return Err(FactoryError::NotCreatable {
                    type_: type_alias.to_string(),
                });
            }
            None => {
                return Err(FactoryError::UnknownType {
                    type_: type_alias.to_string(),
                });
            }
        };
        if !is_valid_handler_name(name) {
            return Err(HandlerError::InvalidName {
                name: name.to_string(),
            }
            .into());
        }

        let mut enabled = true;
        let mut passive = None;
        for pair in args.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(pair, "expected key=value"))?;
            match key.to_ascii_lowercase().as_str() {
                "enabled" => {
                    enabled = value
                        .to_ascii_lowercase()
                        .parse()
                        .map_err(|_| invalid(key, "expected true or false"))?;
                }
                "passive" if kind == HandlerKind::Simple => {
                    passive = Some(
                        value
                            .parse::<PassiveOptions>()
                            .map_err(|_| invalid(key, "unknown passive option"))?,
                    );
                }
                _ => return Err(invalid(key, &format!("not supported by {kind} handlers"))),
            }
        }

        let mut handler: Handler = match kind {
            HandlerKind::Simple => {
                let mut simple = SimpleHandler::new(name, priority);
                if let Some(option) = passive {
                    simple.set_passive_option(option);
                }
                simple.into()
            }
            HandlerKind::Passive => PassiveHandler::new(name, priority).into(),
            HandlerKind::Permission => PermissionHandler::new(name, priority).into(),
            HandlerKind::Global => {
                return Err(FactoryError::NotCreatable {
                    type_: type_alias.to_string(),
                });
            }
        };
        if let Some(user) = creator {
            handler.add_owner(user.clone());
        }
        handler.set_enabled(enabled)?;
        tracing::debug!(handler = %name, %kind, priority, "handler created");
        Ok(handler)
    }

    /// Builds a handler from a fully-read record.
    ///
    /// A record that fails [`HandlerRecord::check`] is refused unless
    /// `force_load` is set, in which case only the rows that fit the declared
    /// kind are used. A record whose kind is unknown is always refused.
    pub fn from_record(record: &HandlerRecord, force_load: bool) -> Result<Handler, Corruption> {
        let kind = match record.check() {
            Ok(kind) => kind,
            Err(corruption) => {
                let Some(kind) = record.kind().filter(|_| force_load) else {
                    return Err(corruption);
                };
                tracing::warn!(
                    handler = %record.meta.name,
                    reason = %corruption,
                    "force-loading corrupted handler"
                );
                kind
            }
        };

        let meta = &record.meta;
        Ok(match kind {
            HandlerKind::Simple => {
                let mut simple = SimpleHandler::with_maps(
                    meta.name.as_str(),
                    meta.priority,
                    role_map(record, FlagRole::Owner),
                    role_map(record, FlagRole::Member),
                    role_map(record, FlagRole::Default),
                );
                simple.set_owners(users(&record.owners));
                simple.set_members(users(&record.members));
                simple.set_passive_option(passive_option(record));
                simple.set_enabled(meta.enabled);
                simple.into()
            }
            HandlerKind::Passive => {
                let mut passive = PassiveHandler::with_flags(
                    meta.name.as_str(),
                    meta.priority,
                    role_map(record, FlagRole::Flags),
                );
                passive.set_owners(users(&record.owners));
                passive.set_enabled(meta.enabled);
                passive.into()
            }
            HandlerKind::Permission => {
                let mut permission = PermissionHandler::new(meta.name.as_str(), meta.priority);
                permission.set_enabled(meta.enabled);
                permission.into()
            }
            // The global handler is always enabled.
            HandlerKind::Global => {
                GlobalHandler::with_flags(role_map(record, FlagRole::Flags)).into()
            }
        })
    }
}

fn invalid(argument: &str, reason: &str) -> FactoryError {
    FactoryError::InvalidArgument {
        argument: argument.to_string(),
        reason: reason.to_string(),
    }
}

/// Map for `role`, skipping rows whose key or value no longer parse.
fn role_map(record: &HandlerRecord, role: FlagRole) -> FlagMap {
    let mut map = role.empty_map();
    let role_name = role.to_string();
    for row in record.flags.iter().filter(|row| row.role == role_name) {
        match (row.key.parse::<Flag>(), row.value.parse::<Tristate>()) {
            (Ok(flag), Ok(value)) => {
                map.put(flag, value);
            }
            _ => tracing::debug!(
                handler = %record.meta.name,
                role = %role_name,
                key = %row.key,
                value = %row.value,
                "skipping unreadable flag row"
            ),
        }
    }
    map
}

fn users(ids: &[String]) -> BTreeSet<UserId> {
    ids.iter()
        .filter_map(|id| {
            let user = UserId::new(id.clone());
            if user.is_none() {
                tracing::debug!(user = %id, "skipping unreadable user id");
            }
            user
        })
        .collect()
}

fn passive_option(record: &HandlerRecord) -> PassiveOptions {
    record
        .settings
        .iter()
        .find(|row| row.key == PASSIVE_SETTING)
        .map_or(PassiveOptions::default(), |row| {
            row.value
                .parse()
                .unwrap_or(PassiveOptions::Passthrough)
        })
}
