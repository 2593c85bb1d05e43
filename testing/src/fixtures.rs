use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}-{id}")
}

pub fn unique_handler_name() -> String {
    unique_id("handler")
}

/// Fresh in-memory database.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn sqlite() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory SQLite pool");
    tracing::debug!("in-memory SQLite fixture ready");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_differ() {
        assert_ne!(unique_id("a"), unique_id("a"));
        assert!(unique_handler_name().starts_with("handler-"));
    }

    #[tokio::test]
    async fn test_sqlite_pools_are_isolated() {
        let first = sqlite().await;
        let second = sqlite().await;
        sqlx::query("CREATE TABLE marker (id INTEGER)")
            .execute(&first)
            .await
            .unwrap();

        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE name = 'marker'")
                .fetch_optional(&second)
                .await
                .unwrap();
        assert!(found.is_none());
    }
}
