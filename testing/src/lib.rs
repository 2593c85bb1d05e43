//! Shared test fixtures for the regionward workspace.
//!
//! - In-memory SQLite pools, one isolated database per call
//! - Process-unique ids for handler and region names
//! - A grant-table [`PermissionService`](ward_core::PermissionService) that
//!   records every node it is asked about

mod fixtures;
mod permissions;

pub use fixtures::*;
pub use permissions::StaticPermissions;
