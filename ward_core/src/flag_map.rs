//! Flag-to-verdict map with a fallback bound at construction.
//!
//! Every role a handler distinguishes (owner, member, everyone else) keeps its
//! own map. What differs between roles is only what a *missing* key means, so
//! that meaning is captured once as a pure function of the key instead of
//! being special-cased at each call site.

use crate::types::{Flag, Tristate};
use std::collections::HashMap;

/// Computes the verdict for a key that has no explicit entry.
pub type DefaultFn = fn(Flag) -> Tristate;

#[derive(Clone)]
pub struct FlagMap {
    entries: HashMap<Flag, Tristate>,
    default: DefaultFn,
}

impl FlagMap {
    pub fn new(default: DefaultFn) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Owner maps allow anything not explicitly restricted.
    pub fn owner() -> Self {
        Self::new(|_| Tristate::Allow)
    }

    /// Member maps defer to the next handler unless told otherwise.
    pub fn member() -> Self {
        Self::new(|_| Tristate::Undefined)
    }

    /// Default (everyone else) maps deny anything not explicitly opened.
    pub fn default_role() -> Self {
        Self::new(|_| Tristate::Deny)
    }

    /// Maps with no opinion on missing keys.
    pub fn undefined() -> Self {
        Self::new(|_| Tristate::Undefined)
    }

    pub fn get(&self, flag: impl Into<Flag>) -> Tristate {
        let flag = flag.into();
        match self.entries.get(&flag) {
            Some(value) => *value,
            None => (self.default)(flag),
        }
    }

    /// Returns the explicit entry, ignoring the fallback.
    pub fn explicit(&self, flag: impl Into<Flag>) -> Option<Tristate> {
        self.entries.get(&flag.into()).copied()
    }

    pub fn put(&mut self, flag: impl Into<Flag>, value: Tristate) -> Option<Tristate> {
        self.entries.insert(flag.into(), value)
    }

    pub fn remove(&mut self, flag: impl Into<Flag>) -> Option<Tristate> {
        self.entries.remove(&flag.into())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Explicit entries ordered by flag, so persisted rows come out stable.
    pub fn entries(&self) -> Vec<(Flag, Tristate)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(flag, _)| *flag);
        entries
    }
}

// The fallback is fixed per role, so two maps are equal when their explicit
// entries are.
impl PartialEq for FlagMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl std::fmt::Debug for FlagMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActiveFlag, PassiveFlag};

    #[test]
    fn test_missing_keys_use_role_default() {
        assert_eq!(FlagMap::owner().get(ActiveFlag::Build), Tristate::Allow);
        assert_eq!(FlagMap::member().get(ActiveFlag::Build), Tristate::Undefined);
        assert_eq!(FlagMap::default_role().get(ActiveFlag::Build), Tristate::Deny);
        assert_eq!(
            FlagMap::undefined().get(PassiveFlag::Explosion),
            Tristate::Undefined
        );
    }

    #[test]
    fn test_explicit_entry_overrides_default() {
        let mut map = FlagMap::default_role();
        assert_eq!(map.put(ActiveFlag::Enter, Tristate::Allow), None);
        assert_eq!(map.get(ActiveFlag::Enter), Tristate::Allow);
        assert_eq!(map.get(ActiveFlag::Exit), Tristate::Deny);

        assert_eq!(
            map.put(ActiveFlag::Enter, Tristate::Undefined),
            Some(Tristate::Allow)
        );
        assert_eq!(map.get(ActiveFlag::Enter), Tristate::Undefined);
    }

    #[test]
    fn test_remove_restores_default() {
        let mut map = FlagMap::owner();
        map.put(ActiveFlag::AttackPlayer, Tristate::Deny);
        assert_eq!(map.remove(ActiveFlag::AttackPlayer), Some(Tristate::Deny));
        assert_eq!(map.get(ActiveFlag::AttackPlayer), Tristate::Allow);
        assert!(map.is_empty());
    }

    #[test]
    fn test_default_fn_sees_the_key() {
        let map = FlagMap::new(|flag| {
            if flag.is_active() {
                Tristate::Deny
            } else {
                Tristate::Allow
            }
        });
        assert_eq!(map.get(ActiveFlag::ItemUse), Tristate::Deny);
        assert_eq!(map.get(PassiveFlag::LeafDecay), Tristate::Allow);
    }

    #[test]
    fn test_entries_are_sorted() {
        let mut map = FlagMap::member();
        map.put(PassiveFlag::MobSpawn, Tristate::Deny);
        map.put(ActiveFlag::Exit, Tristate::Allow);
        map.put(ActiveFlag::BlockPlace, Tristate::Deny);

        let flags: Vec<Flag> = map.entries().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            flags,
            vec![
                Flag::Active(ActiveFlag::BlockPlace),
                Flag::Active(ActiveFlag::Exit),
                Flag::Passive(PassiveFlag::MobSpawn),
            ]
        );
    }

    #[test]
    fn test_equality_ignores_fallback() {
        let mut a = FlagMap::owner();
        let mut b = FlagMap::default_role();
        a.put(ActiveFlag::Build, Tristate::Deny);
        b.put(ActiveFlag::Build, Tristate::Deny);
        assert_eq!(a, b);
    }
}
