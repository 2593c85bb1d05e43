use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Name under which the global handler is registered and persisted.
pub const GLOBAL_HANDLER_NAME: &str = "_global";

const MAX_HANDLER_NAME_LEN: usize = 64;
const RESERVED_HANDLER_NAMES: &[&str] = &["all", "state", "full", "everything"];

/// Three-valued verdict produced by handlers and by the resolution engine.
///
/// `Undefined` means "no opinion": the engine moves on to the next
/// lower-priority handler, and finally to the caller's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tristate {
    Allow,
    Deny,
    #[default]
    Undefined,
}

impl Tristate {
    #[must_use]
    pub fn is_defined(self) -> bool {
        self != Tristate::Undefined
    }

    /// Returns `self` when it carries an opinion, otherwise `fallback`.
    #[must_use]
    pub fn or(self, fallback: Tristate) -> Tristate {
        if self.is_defined() { self } else { fallback }
    }

    #[must_use]
    pub fn from_bool(allowed: bool) -> Tristate {
        if allowed {
            Tristate::Allow
        } else {
            Tristate::Deny
        }
    }

    /// `Some(true)` for `Allow`, `Some(false)` for `Deny`.
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Tristate::Allow => Some(true),
            Tristate::Deny => Some(false),
            Tristate::Undefined => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tristate::Allow => "ALLOW",
            Tristate::Deny => "DENY",
            Tristate::Undefined => "UNDEFINED",
        }
    }
}

impl std::fmt::Display for Tristate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tristate {
    type Err = String;

    // TRUE/FALSE are the spellings used by stores written before the rename.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALLOW" | "TRUE" => Ok(Tristate::Allow),
            "DENY" | "FALSE" => Ok(Tristate::Deny),
            "UNDEFINED" => Ok(Tristate::Undefined),
            _ => Err(format!("Invalid tristate: {}", s)),
        }
    }
}

/// Flags queried for a specific actor performing a discrete action.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ActiveFlag {
    BlockPlace,
    BlockBreak,
    BlockInteract,
    EntityInteract,
    ItemUse,
    AttackPlayer,
    AttackEntity,
    Build,
    Enter,
    Exit,
}

/// Flags describing ambient world behavior; queried without an actor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PassiveFlag {
    BlockGrow,
    FireSpread,
    Explosion,
    MobSpawn,
    LiquidFlow,
    LeafDecay,
}

/// Key type of every [`crate::FlagMap`].
///
/// The string form is the bare flag name; active and passive names are
/// disjoint so a stored key always parses back to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Active(ActiveFlag),
    Passive(PassiveFlag),
}

impl Flag {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Flag::Active(_))
    }

    /// Lowercase name, as used in permission nodes.
    #[must_use]
    pub fn node_name(self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl From<ActiveFlag> for Flag {
    fn from(flag: ActiveFlag) -> Self {
        Flag::Active(flag)
    }
}

impl From<PassiveFlag> for Flag {
    fn from(flag: PassiveFlag) -> Self {
        Flag::Passive(flag)
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Active(flag) => flag.fmt(f),
            Flag::Passive(flag) => flag.fmt(f),
        }
    }
}

impl std::str::FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(flag) = s.parse::<ActiveFlag>() {
            return Ok(Flag::Active(flag));
        }
        s.parse::<PassiveFlag>()
            .map(Flag::Passive)
            .map_err(|_| format!("Unknown flag: {}", s))
    }
}

/// Handler variants known to the engine. The string form is what gets
/// persisted in the `kind` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HandlerKind {
    Simple,
    Passive,
    Permission,
    Global,
}

impl HandlerKind {
    /// Whether the factory may build this kind on request.
    #[must_use]
    pub fn is_creatable(self) -> bool {
        !matches!(self, HandlerKind::Global)
    }
}

/// How a simple handler answers passive (actor-less) queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PassiveOptions {
    /// Always `Undefined`.
    Passthrough,
    /// Consult the handler's default map.
    #[default]
    Default,
    /// Always `Deny`.
    Disallow,
    /// Always `Allow`.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || id.len() > 100 || id.chars().any(char::is_whitespace) {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid user ID"))
    }
}

/// Opaque region identity: a name scoped to a world, or unscoped when
/// `world` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId {
    pub name: String,
    pub world: Option<String>,
}

impl RegionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: None,
        }
    }

    pub fn in_world(name: impl Into<String>, world: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: Some(world.into()),
        }
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.world {
            Some(world) => write!(f, "{}@{}", self.name, world),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::str::FromStr for RegionId {
    type Err = String;

    /// Parses `name` or `name@world`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, world) = match s.split_once('@') {
            Some((name, world)) => (name, Some(world)),
            None => (s, None),
        };
        if name.is_empty() || world.is_some_and(str::is_empty) {
            return Err(format!("Invalid region: {}", s));
        }
        Ok(Self {
            name: name.to_string(),
            world: world.map(str::to_string),
        })
    }
}

/// Checks a user-chosen handler name.
///
/// Names are 1-64 characters of ASCII alphanumerics, `_` and `-`. A leading
/// `_` is reserved for built-in handlers, and a few words are reserved by the
/// selection syntax of the command layer.
#[must_use]
pub fn is_valid_handler_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_HANDLER_NAME_LEN
        && !name.starts_with('_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !RESERVED_HANDLER_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tristate_parse_accepts_legacy_spellings() {
        assert_eq!("ALLOW".parse::<Tristate>().unwrap(), Tristate::Allow);
        assert_eq!("TRUE".parse::<Tristate>().unwrap(), Tristate::Allow);
        assert_eq!("false".parse::<Tristate>().unwrap(), Tristate::Deny);
        assert_eq!("undefined".parse::<Tristate>().unwrap(), Tristate::Undefined);
        assert!("MAYBE".parse::<Tristate>().is_err());
    }

    #[test]
    fn test_tristate_or_keeps_defined_values() {
        assert_eq!(Tristate::Deny.or(Tristate::Allow), Tristate::Deny);
        assert_eq!(Tristate::Undefined.or(Tristate::Allow), Tristate::Allow);
        assert_eq!(Tristate::Undefined.as_bool(), None);
        assert_eq!(Tristate::from_bool(true), Tristate::Allow);
    }

    #[test]
    fn test_flag_names_round_trip() {
        for flag in ActiveFlag::iter() {
            let parsed: Flag = flag.to_string().parse().unwrap();
            assert_eq!(parsed, Flag::Active(flag));
        }
        for flag in PassiveFlag::iter() {
            let parsed: Flag = flag.to_string().parse().unwrap();
            assert_eq!(parsed, Flag::Passive(flag));
        }
    }

    #[test]
    fn test_flag_display_and_node_name() {
        assert_eq!(ActiveFlag::BlockBreak.to_string(), "BLOCK_BREAK");
        assert_eq!(Flag::from(PassiveFlag::FireSpread).node_name(), "fire_spread");
        assert!("NOT_A_FLAG".parse::<Flag>().is_err());
    }

    #[test]
    fn test_flag_serde_is_bare_name() {
        let json = serde_json::to_string(&Flag::Active(ActiveFlag::Build)).unwrap();
        assert_eq!(json, "\"BUILD\"");
        let back: Flag = serde_json::from_str("\"MOB_SPAWN\"").unwrap();
        assert_eq!(back, Flag::Passive(PassiveFlag::MobSpawn));
    }

    #[test]
    fn test_handler_kind_strings() {
        assert_eq!(HandlerKind::Permission.to_string(), "permission");
        assert_eq!("global".parse::<HandlerKind>().unwrap(), HandlerKind::Global);
        assert!(!HandlerKind::Global.is_creatable());
        assert!(HandlerKind::Simple.is_creatable());
    }

    #[test]
    fn test_passive_options_parse() {
        assert_eq!(
            "PASSTHROUGH".parse::<PassiveOptions>().unwrap(),
            PassiveOptions::Passthrough
        );
        assert_eq!("allow".parse::<PassiveOptions>().unwrap(), PassiveOptions::Allow);
        assert!("SOMETIMES".parse::<PassiveOptions>().is_err());
    }

    #[test]
    fn test_region_id_parse() {
        let scoped: RegionId = "spawn@overworld".parse().unwrap();
        assert_eq!(scoped, RegionId::in_world("spawn", "overworld"));
        assert_eq!(scoped.to_string(), "spawn@overworld");

        let unscoped: RegionId = "town".parse().unwrap();
        assert_eq!(unscoped.world, None);

        assert!("@overworld".parse::<RegionId>().is_err());
        assert!("spawn@".parse::<RegionId>().is_err());
    }

    #[test]
    fn test_user_id_validation() {
        assert!(UserId::new("alice".to_string()).is_some());
        assert!(UserId::new(String::new()).is_none());
        assert!(UserId::new("has space".to_string()).is_none());
    }

    #[test]
    fn test_handler_name_validation() {
        assert!(is_valid_handler_name("town-hall_2"));
        assert!(!is_valid_handler_name(""));
        assert!(!is_valid_handler_name("_global"));
        assert!(!is_valid_handler_name("ALL"));
        assert!(!is_valid_handler_name("has space"));
        assert!(!is_valid_handler_name(&"x".repeat(65)));
    }
}
