//! # Policy
//!
//! Handlers, the region-handler link graph and the resolution engine.
//!
//! A query names a set of regions (typically every region containing a point)
//! and an action. The handlers linked to those regions, plus the implicit
//! global handler, are consulted from highest to lowest priority and the first
//! handler with an opinion decides. When nobody has one, the caller's default
//! applies.

pub mod engine;
pub mod handler;
pub mod link_graph;
pub mod manager;

pub use engine::{Explanation, Query, QueryContext, Step};
pub use handler::{
    FlagRole, GLOBAL_PRIORITY, GlobalHandler, Handler, MIN_USER_PRIORITY, PassiveHandler,
    PermissionHandler, SimpleHandler,
};
pub use link_graph::LinkGraph;
pub use manager::PolicyManager;
