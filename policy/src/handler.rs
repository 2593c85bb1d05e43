//! Handler variants.
//!
//! A handler is a named, prioritized policy unit. The four variants answer the
//! same two questions (may this actor do X here, may X happen here at all) from
//! different sources: role-scoped flag maps, a single shared map, an external
//! authorization service, or the global backstop map.

use errors::HandlerError;
use std::collections::BTreeSet;
use strum::{Display, EnumString};
use ward_core::{
    ActiveFlag, Flag, FlagMap, GLOBAL_HANDLER_NAME, HandlerKind, PassiveFlag, PassiveOptions,
    PermissionService, Tristate, UserId,
};

/// Priority of the global handler. Nothing else may sit this low.
pub const GLOBAL_PRIORITY: i32 = i32::MIN;

/// Lowest priority a user handler can hold; requests below are clamped.
pub const MIN_USER_PRIORITY: i32 = i32::MIN + 1;

/// Which flag map of a handler a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FlagRole {
    Owner,
    Member,
    Default,
    /// The single map of passive and global handlers.
    Flags,
}

impl FlagRole {
    /// Roles a handler of `kind` keeps a map for.
    #[must_use]
    pub fn for_kind(kind: HandlerKind) -> &'static [FlagRole] {
        match kind {
            HandlerKind::Simple => &[FlagRole::Owner, FlagRole::Member, FlagRole::Default],
            HandlerKind::Passive | HandlerKind::Global => &[FlagRole::Flags],
            HandlerKind::Permission => &[],
        }
    }

    /// An empty map carrying this role's fallback.
    #[must_use]
    pub fn empty_map(self) -> FlagMap {
        match self {
            FlagRole::Owner => FlagMap::owner(),
            FlagRole::Member => FlagMap::member(),
            FlagRole::Default => FlagMap::default_role(),
            FlagRole::Flags => FlagMap::undefined(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HandlerCommon {
    name: String,
    priority: i32,
    enabled: bool,
}

impl HandlerCommon {
    fn new(name: String, priority: i32) -> Self {
        Self {
            name,
            priority: priority.max(MIN_USER_PRIORITY),
            enabled: true,
        }
    }
}

/// Owner/member/everyone-else policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleHandler {
    common: HandlerCommon,
    owners: BTreeSet<UserId>,
    members: BTreeSet<UserId>,
    owner_flags: FlagMap,
    member_flags: FlagMap,
    default_flags: FlagMap,
    passive_option: PassiveOptions,
}

impl SimpleHandler {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self::with_maps(
            name,
            priority,
            FlagMap::owner(),
            FlagMap::member(),
            FlagMap::default_role(),
        )
    }

    pub fn with_maps(
        name: impl Into<String>,
        priority: i32,
        owner_flags: FlagMap,
        member_flags: FlagMap,
        default_flags: FlagMap,
    ) -> Self {
        Self {
            common: HandlerCommon::new(name.into(), priority),
            owners: BTreeSet::new(),
            members: BTreeSet::new(),
            owner_flags,
            member_flags,
            default_flags,
            passive_option: PassiveOptions::default(),
        }
    }

    pub fn owners(&self) -> &BTreeSet<UserId> {
        &self.owners
    }

    pub fn add_owner(&mut self, user: UserId) -> bool {
        self.owners.insert(user)
    }

    pub fn remove_owner(&mut self, user: &UserId) -> bool {
        self.owners.remove(user)
    }

    pub fn set_owners(&mut self, owners: impl IntoIterator<Item = UserId>) {
        self.owners = owners.into_iter().collect();
    }

    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    pub fn add_member(&mut self, user: UserId) -> bool {
        self.members.insert(user)
    }

    pub fn remove_member(&mut self, user: &UserId) -> bool {
        self.members.remove(user)
    }

    pub fn set_members(&mut self, members: impl IntoIterator<Item = UserId>) {
        self.members = members.into_iter().collect();
    }

    pub fn owner_flags(&self) -> &FlagMap {
        &self.owner_flags
    }

    pub fn owner_flags_mut(&mut self) -> &mut FlagMap {
        &mut self.owner_flags
    }

    pub fn member_flags(&self) -> &FlagMap {
        &self.member_flags
    }

    pub fn member_flags_mut(&mut self) -> &mut FlagMap {
        &mut self.member_flags
    }

    pub fn default_flags(&self) -> &FlagMap {
        &self.default_flags
    }

    pub fn default_flags_mut(&mut self) -> &mut FlagMap {
        &mut self.default_flags
    }

    pub fn passive_option(&self) -> PassiveOptions {
        self.passive_option
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.common.enabled = enabled;
    }

    pub fn set_passive_option(&mut self, option: PassiveOptions) {
        self.passive_option = option;
    }

    /// Owners first, then members, then everyone else.
    pub fn query_active(&self, actor: &UserId, flag: ActiveFlag) -> Tristate {
        if self.owners.contains(actor) {
            self.owner_flags.get(flag)
        } else if self.members.contains(actor) {
            self.member_flags.get(flag)
        } else {
            self.default_flags.get(flag)
        }
    }

    pub fn query_passive(&self, flag: PassiveFlag) -> Tristate {
        match self.passive_option {
            PassiveOptions::Passthrough => Tristate::Undefined,
            PassiveOptions::Default => self.default_flags.get(flag),
            PassiveOptions::Disallow => Tristate::Deny,
            PassiveOptions::Allow => Tristate::Allow,
        }
    }
}

/// One map for every actor and for ambient behavior. Owners only decide who
/// may edit the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PassiveHandler {
    common: HandlerCommon,
    owners: BTreeSet<UserId>,
    flags: FlagMap,
}

impl PassiveHandler {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self::with_flags(name, priority, FlagMap::undefined())
    }

    pub fn with_flags(name: impl Into<String>, priority: i32, flags: FlagMap) -> Self {
        Self {
            common: HandlerCommon::new(name.into(), priority),
            owners: BTreeSet::new(),
            flags,
        }
    }

    pub fn owners(&self) -> &BTreeSet<UserId> {
        &self.owners
    }

    pub fn add_owner(&mut self, user: UserId) -> bool {
        self.owners.insert(user)
    }

    pub fn remove_owner(&mut self, user: &UserId) -> bool {
        self.owners.remove(user)
    }

    pub fn set_owners(&mut self, owners: impl IntoIterator<Item = UserId>) {
        self.owners = owners.into_iter().collect();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.common.enabled = enabled;
    }

    pub fn flags(&self) -> &FlagMap {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut FlagMap {
        &mut self.flags
    }

    pub fn query(&self, flag: impl Into<Flag>) -> Tristate {
        self.flags.get(flag)
    }
}

/// Delegates every decision to the external [`PermissionService`].
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionHandler {
    common: HandlerCommon,
}

impl PermissionHandler {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            common: HandlerCommon::new(name.into(), priority),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.common.enabled = enabled;
    }

    /// Permission node checked for `flag`, e.g.
    /// `regionward.handler.spawn.block_break`.
    pub fn node(&self, flag: impl Into<Flag>) -> String {
        format!(
            "regionward.handler.{}.{}",
            self.common.name,
            flag.into().node_name()
        )
    }

    pub fn query_active(
        &self,
        actor: &UserId,
        flag: ActiveFlag,
        permissions: &dyn PermissionService,
        world: Option<&str>,
    ) -> Tristate {
        Tristate::from_bool(permissions.has_permission(Some(actor), &self.node(flag), world))
    }

    pub fn query_passive(
        &self,
        flag: PassiveFlag,
        permissions: &dyn PermissionService,
        world: Option<&str>,
    ) -> Tristate {
        Tristate::from_bool(permissions.has_permission(None, &self.node(flag), world))
    }
}

/// The backstop consulted for every region, after every linked handler.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalHandler {
    flags: FlagMap,
}

impl GlobalHandler {
    pub fn new() -> Self {
        Self::with_flags(FlagMap::undefined())
    }

    pub fn with_flags(flags: FlagMap) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> &FlagMap {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut FlagMap {
        &mut self.flags
    }
}

impl Default for GlobalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    Simple(SimpleHandler),
    Passive(PassiveHandler),
    Permission(PermissionHandler),
    Global(GlobalHandler),
}

impl Handler {
    fn common(&self) -> Option<&HandlerCommon> {
        match self {
            Handler::Simple(h) => Some(&h.common),
            Handler::Passive(h) => Some(&h.common),
            Handler::Permission(h) => Some(&h.common),
            Handler::Global(_) => None,
        }
    }

    fn common_mut(&mut self) -> Option<&mut HandlerCommon> {
        match self {
            Handler::Simple(h) => Some(&mut h.common),
            Handler::Passive(h) => Some(&mut h.common),
            Handler::Permission(h) => Some(&mut h.common),
            Handler::Global(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        self.common()
            .map_or(GLOBAL_HANDLER_NAME, |common| common.name.as_str())
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Simple(_) => HandlerKind::Simple,
            Handler::Passive(_) => HandlerKind::Passive,
            Handler::Permission(_) => HandlerKind::Permission,
            Handler::Global(_) => HandlerKind::Global,
        }
    }

    pub fn priority(&self) -> i32 {
        self.common()
            .map_or(GLOBAL_PRIORITY, |common| common.priority)
    }

    /// Values below [`MIN_USER_PRIORITY`] are clamped to it.
    pub fn set_priority(&mut self, priority: i32) -> Result<(), HandlerError> {
        let common = self
            .common_mut()
            .ok_or_else(|| HandlerError::global("priority changes"))?;
        common.priority = priority.max(MIN_USER_PRIORITY);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.common().is_none_or(|common| common.enabled)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), HandlerError> {
        let common = self
            .common_mut()
            .ok_or_else(|| HandlerError::global("disabling"))?;
        common.enabled = enabled;
        Ok(())
    }

    /// Uniqueness is the registry's job; see `PolicyManager::rename_handler`.
    pub(crate) fn set_name(&mut self, name: String) -> Result<(), HandlerError> {
        let common = self
            .common_mut()
            .ok_or_else(|| HandlerError::global("rename"))?;
        common.name = name;
        Ok(())
    }

    pub fn query_active(
        &self,
        actor: &UserId,
        flag: ActiveFlag,
        permissions: &dyn PermissionService,
        world: Option<&str>,
    ) -> Tristate {
        match self {
            Handler::Simple(h) => h.query_active(actor, flag),
            Handler::Passive(h) => h.query(flag),
            Handler::Permission(h) => h.query_active(actor, flag, permissions, world),
            Handler::Global(h) => h.flags.get(flag),
        }
    }

    pub fn query_passive(
        &self,
        flag: PassiveFlag,
        permissions: &dyn PermissionService,
        world: Option<&str>,
    ) -> Tristate {
        match self {
            Handler::Simple(h) => h.query_passive(flag),
            Handler::Passive(h) => h.query(flag),
            Handler::Permission(h) => h.query_passive(flag, permissions, world),
            Handler::Global(h) => h.flags.get(flag),
        }
    }

    pub fn owners(&self) -> Option<&BTreeSet<UserId>> {
        match self {
            Handler::Simple(h) => Some(&h.owners),
            Handler::Passive(h) => Some(&h.owners),
            Handler::Permission(_) | Handler::Global(_) => None,
        }
    }

    pub fn members(&self) -> Option<&BTreeSet<UserId>> {
        match self {
            Handler::Simple(h) => Some(&h.members),
            _ => None,
        }
    }

    /// `false` when the user already owns the handler or the variant has no
    /// owners.
    pub fn add_owner(&mut self, user: UserId) -> bool {
        match self {
            Handler::Simple(h) => h.add_owner(user),
            Handler::Passive(h) => h.add_owner(user),
            Handler::Permission(_) | Handler::Global(_) => false,
        }
    }

    pub fn remove_owner(&mut self, user: &UserId) -> bool {
        match self {
            Handler::Simple(h) => h.remove_owner(user),
            Handler::Passive(h) => h.remove_owner(user),
            Handler::Permission(_) | Handler::Global(_) => false,
        }
    }

    pub fn set_owners(&mut self, owners: impl IntoIterator<Item = UserId>) -> bool {
        match self {
            Handler::Simple(h) => h.set_owners(owners),
            Handler::Passive(h) => h.set_owners(owners),
            Handler::Permission(_) | Handler::Global(_) => return false,
        }
        true
    }

    pub fn add_member(&mut self, user: UserId) -> bool {
        match self {
            Handler::Simple(h) => h.add_member(user),
            _ => false,
        }
    }

    pub fn remove_member(&mut self, user: &UserId) -> bool {
        match self {
            Handler::Simple(h) => h.remove_member(user),
            _ => false,
        }
    }

    pub fn set_members(&mut self, members: impl IntoIterator<Item = UserId>) -> bool {
        match self {
            Handler::Simple(h) => {
                h.set_members(members);
                true
            }
            _ => false,
        }
    }

    /// Whether `user` may edit this handler.
    pub fn can_manage(&self, user: &UserId) -> bool {
        self.owners().is_some_and(|owners| owners.contains(user))
    }

    pub fn flag_map(&self, role: FlagRole) -> Option<&FlagMap> {
        match (self, role) {
            (Handler::Simple(h), FlagRole::Owner) => Some(&h.owner_flags),
            (Handler::Simple(h), FlagRole::Member) => Some(&h.member_flags),
            (Handler::Simple(h), FlagRole::Default) => Some(&h.default_flags),
            (Handler::Passive(h), FlagRole::Flags) => Some(&h.flags),
            (Handler::Global(h), FlagRole::Flags) => Some(&h.flags),
            _ => None,
        }
    }

    pub fn flag_map_mut(&mut self, role: FlagRole) -> Option<&mut FlagMap> {
        match (self, role) {
            (Handler::Simple(h), FlagRole::Owner) => Some(&mut h.owner_flags),
            (Handler::Simple(h), FlagRole::Member) => Some(&mut h.member_flags),
            (Handler::Simple(h), FlagRole::Default) => Some(&mut h.default_flags),
            (Handler::Passive(h), FlagRole::Flags) => Some(&mut h.flags),
            (Handler::Global(h), FlagRole::Flags) => Some(&mut h.flags),
            _ => None,
        }
    }
}

impl From<SimpleHandler> for Handler {
    fn from(handler: SimpleHandler) -> Self {
        Handler::Simple(handler)
    }
}

impl From<PassiveHandler> for Handler {
    fn from(handler: PassiveHandler) -> Self {
        Handler::Passive(handler)
    }
}

impl From<PermissionHandler> for Handler {
    fn from(handler: PermissionHandler) -> Self {
        Handler::Permission(handler)
    }
}

impl From<GlobalHandler> for Handler {
    fn from(handler: GlobalHandler) -> Self {
        Handler::Global(handler)
    }
}
