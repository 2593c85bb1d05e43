//! Connection pool setup.

use config::DatabaseConfig;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Opens a pool for `config.url`.
///
/// An in-memory database exists per connection, so such URLs get a single
/// connection that is never recycled.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = if config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.pool_size)
    };
    let pool = options.connect(&config.url).await?;
    tracing::debug!(url = %config.url, "database pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_file_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ward.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            pool_size: 2,
        };

        let pool = connect(&config).await.unwrap();
        sqlx::query("CREATE TABLE scratch (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_connect_memory_database() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool_size: 8,
        };
        let pool = connect(&config).await.unwrap();
        assert_eq!(pool.options().get_max_connections(), 1);
    }
}
