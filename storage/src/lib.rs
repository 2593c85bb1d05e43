//! # Storage Layer
//!
//! SQLite persistence for handlers and region links.
//!
//! - [`HandlerRecord`]: everything stored about one handler, read in one
//!   transaction
//! - [`HandlerFactory`]: builds handlers from a type alias or a record
//! - [`HandlerStore`]: load/save/delete with the configured corruption policy

pub mod factory;
pub mod handler_store;
pub mod pool;
pub mod records;

pub use factory::HandlerFactory;
pub use handler_store::{
    CorruptedHandler, HandlerStore, HandlerStoreError, LoadOutcome, LoadReport, QuarantinedHandler,
};
pub use pool::connect;
pub use records::{Corruption, FlagRow, HandlerMeta, HandlerRecord, RawHandlerRow, SettingRow};
