//! Handler registry, link graph and global singleton under one owner.

use crate::engine::{self, Explanation, QueryContext};
use crate::handler::{FlagRole, GlobalHandler, Handler};
use crate::link_graph::LinkGraph;
use errors::HandlerError;
use std::collections::HashMap;
use std::iter;
use std::sync::Arc;
use ward_core::{
    DenyAllPermissions, FlagMap, GLOBAL_HANDLER_NAME, PermissionService, RegionId, Tristate,
    UserId, is_valid_handler_name,
};

pub struct PolicyManager {
    handlers: HashMap<String, Handler>,
    global: Handler,
    links: LinkGraph,
    permissions: Arc<dyn PermissionService>,
}

impl PolicyManager {
    pub fn new(permissions: Arc<dyn PermissionService>) -> Self {
        Self {
            handlers: HashMap::new(),
            global: GlobalHandler::new().into(),
            links: LinkGraph::new(),
            permissions,
        }
    }

    /// Registers a user handler.
    ///
    /// # Errors
    ///
    /// `GlobalImmutable` for a global handler (use [`Self::replace_global`]),
    /// `InvalidName` or `NameConflict` otherwise.
    pub fn add_handler(&mut self, handler: Handler) -> Result<(), HandlerError> {
        if matches!(handler, Handler::Global(_)) {
            return Err(HandlerError::global("registration"));
        }
        let name = handler.name().to_string();
        if !is_valid_handler_name(&name) {
            return Err(HandlerError::InvalidName { name });
        }
        if self.handlers.contains_key(&name) {
            return Err(HandlerError::NameConflict { name });
        }
        tracing::debug!(handler = %name, kind = %handler.kind(), "handler registered");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Unregisters a handler and drops all of its links.
    pub fn remove_handler(&mut self, name: &str) -> Result<Handler, HandlerError> {
        if name == GLOBAL_HANDLER_NAME {
            return Err(HandlerError::global("removal"));
        }
        let handler = self
            .handlers
            .remove(name)
            .ok_or_else(|| HandlerError::NotFound {
                name: name.to_string(),
            })?;
        let dropped = self.links.drop_handler(name);
        tracing::debug!(handler = %name, links = dropped, "handler removed");
        Ok(handler)
    }

    /// Renames a handler, keeping its links.
    pub fn rename_handler(&mut self, old: &str, new: &str) -> Result<(), HandlerError> {
        if old == GLOBAL_HANDLER_NAME {
            return Err(HandlerError::global("rename"));
        }
        if !is_valid_handler_name(new) {
            return Err(HandlerError::InvalidName {
                name: new.to_string(),
            });
        }
        if !self.handlers.contains_key(old) {
            return Err(HandlerError::NotFound {
                name: old.to_string(),
            });
        }
        if old == new {
            return Ok(());
        }
        if self.handlers.contains_key(new) {
            return Err(HandlerError::NameConflict {
                name: new.to_string(),
            });
        }
        let Some(mut handler) = self.handlers.remove(old) else {
            return Err(HandlerError::NotFound {
                name: old.to_string(),
            });
        };
        handler.set_name(new.to_string())?;
        self.handlers.insert(new.to_string(), handler);
        self.links.rename_handler(old, new);
        tracing::debug!(from = %old, to = %new, "handler renamed");
        Ok(())
    }

    /// Looks a handler up by name; `_global` resolves to the global handler.
    pub fn handler(&self, name: &str) -> Option<&Handler> {
        if name == GLOBAL_HANDLER_NAME {
            return Some(&self.global);
        }
        self.handlers.get(name)
    }

    // Never handed out: replacing a whole handler could change its name
    // under the registry key.
    fn entry_mut(&mut self, name: &str) -> Result<&mut Handler, HandlerError> {
        if name == GLOBAL_HANDLER_NAME {
            return Ok(&mut self.global);
        }
        self.handlers
            .get_mut(name)
            .ok_or_else(|| HandlerError::NotFound {
                name: name.to_string(),
            })
    }

    /// Flag map `role` of a handler, `None` if the handler is unknown or has
    /// no such map.
    pub fn flag_map_mut(&mut self, name: &str, role: FlagRole) -> Option<&mut FlagMap> {
        self.entry_mut(name).ok()?.flag_map_mut(role)
    }

    pub fn set_priority(&mut self, name: &str, priority: i32) -> Result<(), HandlerError> {
        self.entry_mut(name)?.set_priority(priority)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), HandlerError> {
        self.entry_mut(name)?.set_enabled(enabled)
    }

    /// `Ok(false)` if the user was already an owner or the handler has no
    /// owners.
    pub fn add_owner(&mut self, name: &str, user: UserId) -> Result<bool, HandlerError> {
        Ok(self.entry_mut(name)?.add_owner(user))
    }

    pub fn remove_owner(&mut self, name: &str, user: &UserId) -> Result<bool, HandlerError> {
        Ok(self.entry_mut(name)?.remove_owner(user))
    }

    pub fn add_member(&mut self, name: &str, user: UserId) -> Result<bool, HandlerError> {
        Ok(self.entry_mut(name)?.add_member(user))
    }

    pub fn remove_member(&mut self, name: &str, user: &UserId) -> Result<bool, HandlerError> {
        Ok(self.entry_mut(name)?.remove_member(user))
    }

    pub fn contains(&self, name: &str) -> bool {
        name == GLOBAL_HANDLER_NAME || self.handlers.contains_key(name)
    }

    /// User handlers ordered by name. The global handler is not included.
    pub fn handlers(&self) -> Vec<&Handler> {
        let mut handlers: Vec<&Handler> = self.handlers.values().collect();
        handlers.sort_by(|a, b| a.name().cmp(b.name()));
        handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn global(&self) -> &Handler {
        &self.global
    }

    pub fn replace_global(&mut self, global: GlobalHandler) {
        self.global = global.into();
    }

    pub fn permissions(&self) -> &dyn PermissionService {
        self.permissions.as_ref()
    }

    /// `false` when the handler is unknown, global, or already linked.
    pub fn link(&mut self, region: &RegionId, handler: &str) -> bool {
        if !self.handlers.contains_key(handler) {
            return false;
        }
        self.links.link(region, handler)
    }

    pub fn unlink(&mut self, region: &RegionId, handler: &str) -> bool {
        self.links.unlink(region, handler)
    }

    /// Handlers explicitly linked to `region`. Never contains the global
    /// handler.
    pub fn links_of(&self, region: &RegionId) -> Vec<&Handler> {
        self.links
            .links_of(region)
            .into_iter()
            .filter_map(|name| self.handlers.get(name))
            .collect()
    }

    pub fn regions_of(&self, handler: &str) -> Vec<&RegionId> {
        self.links.regions_of(handler)
    }

    /// Forgets a destroyed region.
    pub fn drop_region(&mut self, region: &RegionId) -> usize {
        self.links.drop_region(region)
    }

    pub fn link_graph(&self) -> &LinkGraph {
        &self.links
    }

    fn candidates<'a, R>(&'a self, regions: R) -> Vec<&'a Handler>
    where
        R: IntoIterator<Item = &'a RegionId>,
    {
        regions
            .into_iter()
            .flat_map(|region| self.links_of(region))
            .chain(iter::once(&self.global))
            .collect()
    }

    /// Resolves `ctx` for the union of `regions`.
    pub fn evaluate<'a, R>(&'a self, regions: R, ctx: &QueryContext, default: Tristate) -> Tristate
    where
        R: IntoIterator<Item = &'a RegionId>,
    {
        engine::resolve(
            self.candidates(regions),
            ctx,
            self.permissions.as_ref(),
            default,
        )
    }

    pub fn explain<'a, R>(
        &'a self,
        regions: R,
        ctx: &QueryContext,
        default: Tristate,
    ) -> Explanation
    where
        R: IntoIterator<Item = &'a RegionId>,
    {
        engine::explain(
            self.candidates(regions),
            ctx,
            self.permissions.as_ref(),
            default,
        )
    }
}

impl Default for PolicyManager {
    fn default() -> Self {
        Self::new(Arc::new(DenyAllPermissions))
    }
}

impl std::fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyManager")
            .field("handlers", &self.handlers.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{PassiveHandler, SimpleHandler};
    use ward_core::ActiveFlag;

    fn spawn() -> RegionId {
        RegionId::new("spawn")
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_names() {
        let mut manager = PolicyManager::default();
        manager
            .add_handler(SimpleHandler::new("town", 1).into())
            .unwrap();

        let err = manager
            .add_handler(PassiveHandler::new("town", 2).into())
            .unwrap_err();
        assert_eq!(
            err,
            HandlerError::NameConflict {
                name: "town".to_string()
            }
        );
        assert!(matches!(
            manager.add_handler(SimpleHandler::new("_hidden", 1).into()),
            Err(HandlerError::InvalidName { .. })
        ));
        assert!(matches!(
            manager.add_handler(GlobalHandler::new().into()),
            Err(HandlerError::GlobalImmutable { .. })
        ));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_global_cannot_be_removed_or_renamed() {
        let mut manager = PolicyManager::default();
        assert!(manager.remove_handler(GLOBAL_HANDLER_NAME).is_err());
        assert!(manager.rename_handler(GLOBAL_HANDLER_NAME, "other").is_err());
        assert!(manager.contains(GLOBAL_HANDLER_NAME));
        assert_eq!(
            manager.handler(GLOBAL_HANDLER_NAME).map(Handler::name),
            Some(GLOBAL_HANDLER_NAME)
        );
    }

    #[test]
    fn test_link_requires_registered_handler() {
        let mut manager = PolicyManager::default();
        assert!(!manager.link(&spawn(), "ghost"));
        assert!(!manager.link(&spawn(), GLOBAL_HANDLER_NAME));

        manager
            .add_handler(SimpleHandler::new("town", 1).into())
            .unwrap();
        assert!(manager.link(&spawn(), "town"));
        assert!(!manager.link(&spawn(), "town"));
        assert_eq!(manager.links_of(&spawn()).len(), 1);
    }

    #[test]
    fn test_rename_to_taken_name_changes_nothing() {
        let mut manager = PolicyManager::default();
        manager
            .add_handler(SimpleHandler::new("town", 1).into())
            .unwrap();
        manager
            .add_handler(SimpleHandler::new("admin", 100).into())
            .unwrap();
        manager.link(&spawn(), "town");

        assert!(matches!(
            manager.rename_handler("town", "admin"),
            Err(HandlerError::NameConflict { .. })
        ));
        assert!(manager.contains("town"));
        assert_eq!(manager.regions_of("town"), vec![&spawn()]);
        assert!(matches!(
            manager.rename_handler("missing", "x"),
            Err(HandlerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_keeps_links() {
        let mut manager = PolicyManager::default();
        manager
            .add_handler(SimpleHandler::new("town", 1).into())
            .unwrap();
        manager.link(&spawn(), "town");

        manager.rename_handler("town", "city").unwrap();
        assert!(!manager.contains("town"));
        assert_eq!(manager.handler("city").map(Handler::name), Some("city"));
        assert_eq!(
            manager
                .links_of(&spawn())
                .into_iter()
                .map(Handler::name)
                .collect::<Vec<_>>(),
            vec!["city"]
        );
    }

    #[test]
    fn test_mutators_address_handlers_by_name() {
        let mut manager = PolicyManager::default();
        manager
            .add_handler(SimpleHandler::new("town", 1).into())
            .unwrap();
        let alice = ward_core::UserId::new("alice".to_string()).unwrap();

        assert!(manager.add_owner("town", alice.clone()).unwrap());
        assert!(!manager.add_owner("town", alice.clone()).unwrap());
        assert!(manager.add_member("town", alice.clone()).unwrap());
        assert!(manager.remove_member("town", &alice).unwrap());
        manager.set_priority("town", 40).unwrap();
        manager.set_enabled("town", false).unwrap();

        let town = manager.handler("town").unwrap();
        assert_eq!(town.name(), "town");
        assert_eq!(town.priority(), 40);
        assert!(!town.is_enabled());
        assert!(town.can_manage(&alice));

        assert!(matches!(
            manager.set_enabled("ghost", false),
            Err(HandlerError::NotFound { .. })
        ));
        assert!(matches!(
            manager.set_priority(GLOBAL_HANDLER_NAME, 5),
            Err(HandlerError::GlobalImmutable { .. })
        ));
        assert!(manager.flag_map_mut("ghost", FlagRole::Flags).is_none());
        assert!(manager.flag_map_mut("town", FlagRole::Flags).is_none());
        assert!(manager.flag_map_mut("town", FlagRole::Owner).is_some());
    }

    #[test]
    fn test_global_map_is_editable_through_manager() {
        let mut manager = PolicyManager::default();
        let flags = manager
            .flag_map_mut(GLOBAL_HANDLER_NAME, FlagRole::Flags)
            .unwrap();
        flags.put(ActiveFlag::Build, Tristate::Deny);

        let ctx = QueryContext::active(
            ward_core::UserId::new("bob".to_string()).unwrap(),
            ActiveFlag::Build,
        );
        assert_eq!(
            manager.evaluate([&spawn()], &ctx, Tristate::Allow),
            Tristate::Deny
        );
    }
}
