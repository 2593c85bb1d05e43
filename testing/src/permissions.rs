use std::collections::HashSet;
use std::sync::Mutex;
use ward_core::{PermissionService, UserId};

/// Permission backend backed by an explicit grant table.
///
/// Passive grants apply to queries without a subject. World is ignored.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    grants: HashSet<(Option<String>, String)>,
    asked: Mutex<Vec<String>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant(mut self, user: &str, node: &str) -> Self {
        self.grants.insert((Some(user.to_string()), node.to_string()));
        self
    }

    #[must_use]
    pub fn grant_passive(mut self, node: &str) -> Self {
        self.grants.insert((None, node.to_string()));
        self
    }

    /// Nodes queried so far, in call order.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }
}

impl PermissionService for StaticPermissions {
    fn has_permission(&self, subject: Option<&UserId>, node: &str, _world: Option<&str>) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(node.to_string());
        }
        let key = (subject.map(|s| s.as_str().to_string()), node.to_string());
        self.grants.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_are_per_subject() {
        let perms = StaticPermissions::new()
            .grant("alice", "a.node")
            .grant_passive("p.node");
        let alice = UserId::new("alice".to_string()).unwrap();

        assert!(perms.has_permission(Some(&alice), "a.node", None));
        assert!(!perms.has_permission(None, "a.node", None));
        assert!(perms.has_permission(None, "p.node", Some("nether")));
        assert!(!perms.has_permission(Some(&alice), "p.node", None));
        assert_eq!(perms.asked().len(), 4);
    }
}
