#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::SubjectName;
use fpterm_core::TemplateId;
use sqlx::SqlitePool;

/// Repository trait for subject names.
///
/// Uses native async trait methods (Edition 2024).
pub trait NameRepository: Send + Sync {
    /// Find the name stored for a slot
    async fn find(&self, id: TemplateId) -> StorageResult<Option<SubjectName>>;

    /// Insert or replace the name for a slot; the name must already be validated
    async fn upsert(&self, id: TemplateId, name: &str) -> StorageResult<()>;

    /// Delete the name for a slot, returning whether a row existed
    async fn delete(&self, id: TemplateId) -> StorageResult<bool>;

    /// All names ordered by slot
    async fn list_all(&self) -> StorageResult<Vec<SubjectName>>;

    /// Delete every name, returning how many were removed
    async fn clear(&self) -> StorageResult<u64>;
}

/// SQLite implementation of NameRepository
#[derive(Debug, Clone)]
pub struct SqliteNameRepository {
    pool: SqlitePool,
}

impl SqliteNameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl NameRepository for SqliteNameRepository {
    async fn find(&self, id: TemplateId) -> StorageResult<Option<SubjectName>> {
        let row = sqlx::query_as::<_, SubjectName>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM subject_names
            WHERE id = ?
            "#,
        )
        .bind(i64::from(id.as_u16()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert(&self, id: TemplateId, name: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subject_names (id, name)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(i64::from(id.as_u16()))
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: TemplateId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM subject_names WHERE id = ?")
            .bind(i64::from(id.as_u16()))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> StorageResult<Vec<SubjectName>> {
        let rows = sqlx::query_as::<_, SubjectName>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM subject_names
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn clear(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM subject_names")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
