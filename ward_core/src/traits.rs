//! Core traits for the regionward policy engine

use crate::types::UserId;

/// External authorization backend consulted by permission handlers.
///
/// The backend is closed-world: every node resolves to granted or not, it
/// never abstains. `subject` is `None` for passive queries.
pub trait PermissionService: Send + Sync {
    fn has_permission(&self, subject: Option<&UserId>, node: &str, world: Option<&str>) -> bool;
}

/// Backend that grants nothing. Used when no authorization service is wired
/// in.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllPermissions;

impl PermissionService for DenyAllPermissions {
    fn has_permission(&self, _subject: Option<&UserId>, _node: &str, _world: Option<&str>) -> bool {
        false
    }
}
