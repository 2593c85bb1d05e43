use assert_cmd::{Command, cargo_bin_cmd};
use predicates::prelude::predicate;
use tempfile::TempDir;

/// A scratch database plus a command builder pointed at it.
struct Store {
    _dir: TempDir,
    url: String,
}

impl Store {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ward.db").display());
        Self { _dir: dir, url }
    }

    fn wardctl(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("wardctl");
        cmd.env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("RW_CONFIG")
            .env_remove("RW_STORAGE_FORCE_LOAD")
            .env_remove("RW_STORAGE_PURGE_CORRUPTED")
            .env_remove("RW_STORAGE_QUARANTINE_CORRUPTED")
            .env_remove("RW_DATABASE_POOL_SIZE")
            .env_remove("RW_LOG_LEVEL")
            .args(["--database", &self.url]);
        cmd
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn test_help_flag() {
        cargo_bin_cmd!("wardctl")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage:"))
            .stdout(predicate::str::contains("evaluate"));
    }

    #[test]
    fn test_version_flag() {
        cargo_bin_cmd!("wardctl")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("wardctl"));
    }

    #[test]
    fn test_evaluate_needs_a_query() {
        cargo_bin_cmd!("wardctl")
            .args(["evaluate", "--region", "spawn"])
            .assert()
            .failure();
    }
}

mod handlers {
    use super::*;

    #[test]
    fn test_empty_store_lists_nothing() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "list", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn test_create_then_list() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "town", "--priority", "5", "--owner", "alice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created simple handler"));

        store
            .wardctl()
            .args(["handlers", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("town"))
            .stdout(predicate::str::contains("1 handler(s)"));

        store
            .wardctl()
            .args(["handlers", "show", "town", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"alice\""));
    }

    #[test]
    fn test_create_rejects_duplicates_and_reserved_names() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "town"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["handlers", "create", "town"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already in use"));
        store
            .wardctl()
            .args(["handlers", "create", "_hidden"])
            .assert()
            .failure();
        store
            .wardctl()
            .args(["handlers", "create", "world", "--type", "global"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be created"));
    }

    #[test]
    fn test_negative_priority_is_accepted() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "wild", "--type", "passive", "--priority", "-10"])
            .assert()
            .success()
            .stdout(predicate::str::contains("priority -10"));
    }

    #[test]
    fn test_global_handler_cannot_be_deleted() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "delete", "_global"])
            .assert()
            .failure();
        store
            .wardctl()
            .args(["handlers", "delete", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_flag_on_missing_map_fails() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "perms", "--type", "permission"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["handlers", "flag", "perms", "default", "BUILD", "allow"])
            .assert()
            .failure();
    }
}

mod resolution {
    use super::*;

    fn seeded() -> Store {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "town", "--priority", "1", "--owner", "alice"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["links", "add", "spawn", "town"])
            .assert()
            .success();
        store
    }

    #[test]
    fn test_owner_may_build_stranger_may_not() {
        let store = seeded();
        store
            .wardctl()
            .args(["evaluate", "--region", "spawn", "--actor", "alice", "--flag", "build", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"ALLOW\""));
        store
            .wardctl()
            .args(["evaluate", "--region", "spawn", "--actor", "bob", "--flag", "build", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"DENY\""))
            .stdout(predicate::str::contains("\"decided_by\": \"town\""));
    }

    #[test]
    fn test_flag_change_is_persisted() {
        let store = seeded();
        store
            .wardctl()
            .args(["handlers", "flag", "town", "default", "BUILD", "allow"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["evaluate", "--region", "spawn", "--actor", "bob", "--flag", "build", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"ALLOW\""));
    }

    #[test]
    fn test_global_flags_apply_everywhere() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "flag", "_global", "flags", "FIRE_SPREAD", "deny"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["evaluate", "--region", "anywhere", "--passive", "fire_spread", "--default", "allow", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"DENY\""))
            .stdout(predicate::str::contains("\"decided_by\": \"_global\""));
    }

    #[test]
    fn test_unlinked_region_uses_default() {
        let store = seeded();
        store
            .wardctl()
            .args(["evaluate", "--region", "market", "--actor", "bob", "--flag", "build", "--default", "allow", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"ALLOW\""))
            .stdout(predicate::str::contains("\"decided_by\": null"));
    }

    #[test]
    fn test_permission_handler_uses_granted_nodes() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "perms", "--type", "permission", "--priority", "10"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["links", "add", "spawn", "perms"])
            .assert()
            .success();
        store
            .wardctl()
            .args([
                "evaluate", "--region", "spawn", "--actor", "bob", "--flag", "build",
                "--grant", "regionward.handler.perms.build", "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"ALLOW\""));
        store
            .wardctl()
            .args(["evaluate", "--region", "spawn", "--actor", "bob", "--flag", "build", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"result\": \"DENY\""));
    }
}

mod links {
    use super::*;

    #[test]
    fn test_link_requires_stored_handler() {
        let store = Store::new();
        store
            .wardctl()
            .args(["links", "add", "spawn", "ghost"])
            .assert()
            .failure();
        store
            .wardctl()
            .args(["links", "add", "spawn", "_global"])
            .assert()
            .failure();
    }

    #[test]
    fn test_delete_handler_drops_links() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "town"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["links", "add", "spawn@overworld", "town"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["links", "list", "--handler", "town", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"world\": \"overworld\""));

        store
            .wardctl()
            .args(["handlers", "delete", "town"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["links", "list", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn test_unlink_missing_pair_fails() {
        let store = Store::new();
        store
            .wardctl()
            .args(["links", "remove", "spawn", "town"])
            .assert()
            .failure();
    }
}

mod check {
    use super::*;

    #[test]
    fn test_clean_store_passes_strict_check() {
        let store = Store::new();
        store
            .wardctl()
            .args(["handlers", "create", "town"])
            .assert()
            .success();
        store
            .wardctl()
            .args(["check", "--strict", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"clean\": true"));
    }
}
