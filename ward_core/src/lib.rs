//! # Regionward Core
//!
//! Shared types and traits for the regionward policy engine.
//!
//! This crate provides:
//! - The three-valued [`Tristate`] decision type
//! - Active and passive query flags
//! - [`FlagMap`], a flag-to-verdict map with a per-role fallback
//! - Identity types for users and regions
//! - The [`PermissionService`] seam to an external authorization system
//!
//! Nothing in here knows about handlers, links or storage; those live in the
//! `policy` and `storage` crates.

pub mod flag_map;
pub mod traits;
pub mod types;

pub use flag_map::FlagMap;
pub use traits::{DenyAllPermissions, PermissionService};
pub use types::{
    ActiveFlag, Flag, GLOBAL_HANDLER_NAME, HandlerKind, PassiveFlag, PassiveOptions, RegionId,
    Tristate, UserId, is_valid_handler_name,
};
