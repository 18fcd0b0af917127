//! Storage layer for the fingerprint terminal.
//!
//! Templates live on the sensor itself; what the terminal persists is the
//! name shown for each template slot. This crate keeps those names in
//! SQLite and serves them from memory.
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`NameRepository`] - Data access trait, with [`SqliteNameRepository`]
//! - [`NameDirectory`] - Write-through in-memory copy used for lookups
//!
//! # Examples
//!
//! ```no_run
//! use fpterm_core::{NameLookup, TemplateId};
//! use fpterm_storage::{Database, DatabaseConfig, NameDirectory, SqliteNameRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("fpterm.db")).await?;
//! let names = NameDirectory::load(SqliteNameRepository::new(db.pool().clone())).await?;
//!
//! let id = TemplateId::new(7)?;
//! names.set(id, "Ana").await?;
//! assert_eq!(names.name_for(id).as_deref(), Some("Ana"));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod directory;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use directory::NameDirectory;
pub use error::{StorageError, StorageResult};
pub use models::SubjectName;
pub use repositories::{NameRepository, SqliteNameRepository};
