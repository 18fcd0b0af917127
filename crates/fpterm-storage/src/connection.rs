//! SQLite pool holding the subject name table.
//!
//! The file is opened in WAL mode so the HTTP handlers and the console can
//! write names while the coordinator reads them. Migrations from the
//! workspace `migrations/` directory run on every open.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use fpterm_core::config::StorageConfig;

use crate::error::{StorageError, StorageResult};

/// How to reach the name database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// File at `path` with the default pool settings.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::from(&StorageConfig::default())
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging()
    }
}

impl From<&StorageConfig> for DatabaseConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            path: config.database_path.clone(),
            max_connections: config.max_connections,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Shared handle to the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and bring its schema up to date.
    ///
    /// ```no_run
    /// use fpterm_core::config::StorageConfig;
    /// use fpterm_storage::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::from(&StorageConfig::default())).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        if config.max_connections == 0 {
            return Err(StorageError::Configuration(
                "max_connections must be > 0".to_string(),
            ));
        }
        if let Some(dir) = Path::new(&config.path).parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::Configuration(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        info!(
            path = %config.path,
            max_connections = config.max_connections,
            "Name database ready"
        );
        Ok(db)
    }

    /// Private in-memory database, used by tests.
    ///
    /// A single connection that never idles out, since closing it would
    /// discard the data.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations; already applied ones are skipped.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to return, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_follows_storage_section() {
        let storage = StorageConfig {
            database_path: "/var/lib/fpterm/names.db".to_string(),
            max_connections: 2,
            busy_timeout_ms: 250,
        };
        let config = DatabaseConfig::from(&storage);

        assert_eq!(config.path, "/var/lib/fpterm/names.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_new_keeps_default_pool() {
        let config = DatabaseConfig::new("other.db");
        let defaults = DatabaseConfig::from(&StorageConfig::default());

        assert_eq!(config.path, "other.db");
        assert_eq!(config.max_connections, defaults.max_connections);
        assert_eq!(config.busy_timeout, defaults.busy_timeout);
    }

    #[tokio::test]
    async fn test_empty_pool_rejected() {
        let mut config = DatabaseConfig::new("unused.db");
        config.max_connections = 0;

        let result = Database::new(config).await;
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/names.db");

        let db = Database::new(DatabaseConfig::new(path.to_string_lossy()))
            .await
            .unwrap();
        db.health_check().await.unwrap();
        db.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_in_memory_health_check() {
        let db = Database::in_memory().await.unwrap();
        db.health_check().await.unwrap();
    }
}
