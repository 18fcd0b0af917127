//! In-memory view of the subject names.
//!
//! The scan coordinator looks names up from its poll step, which must not
//! wait on SQLite. [`NameDirectory`] loads every row once at start-up and
//! keeps the copy in step with writes that go through it.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use fpterm_core::{NameLookup, TemplateId};

use crate::error::StorageResult;
use crate::models::SubjectName;
use crate::repositories::{NameRepository, SqliteNameRepository};

/// Write-through cache of subject names.
#[derive(Debug)]
pub struct NameDirectory {
    repo: SqliteNameRepository,
    names: RwLock<HashMap<TemplateId, String>>,
}

impl NameDirectory {
    /// Load all stored names.
    ///
    /// Rows whose id is outside the slot range are skipped.
    pub async fn load(repo: SqliteNameRepository) -> StorageResult<Self> {
        let names: HashMap<_, _> = repo
            .list_all()
            .await?
            .into_iter()
            .filter_map(|row| row.template_id().map(|id| (id, row.name)))
            .collect();
        info!(count = names.len(), "Subject names loaded");

        Ok(Self {
            repo,
            names: RwLock::new(names),
        })
    }

    /// Store a name for `id`, replacing any previous one.
    ///
    /// Returns the normalized name that was stored.
    pub async fn set(&self, id: TemplateId, name: &str) -> StorageResult<String> {
        let name = SubjectName::validate_name(name)?;
        self.repo.upsert(id, &name).await?;
        debug!(key = %id.name_key(), name = %name, "Subject name stored");
        self.names.write().insert(id, name.clone());
        Ok(name)
    }

    /// Forget the name for `id`. Returns whether one was stored.
    pub async fn remove(&self, id: TemplateId) -> StorageResult<bool> {
        let existed = self.repo.delete(id).await?;
        self.names.write().remove(&id);
        if existed {
            debug!(key = %id.name_key(), "Subject name removed");
        }
        Ok(existed)
    }

    /// Forget every name.
    pub async fn clear(&self) -> StorageResult<u64> {
        let removed = self.repo.clear().await?;
        self.names.write().clear();
        info!(removed, "Subject names cleared");
        Ok(removed)
    }

    pub fn get(&self, id: TemplateId) -> Option<String> {
        self.names.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl NameLookup for NameDirectory {
    fn name_for(&self, id: TemplateId) -> Option<String> {
        self.get(id)
    }
}
