use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fpterm_core::TemplateId;

use crate::error::{StorageError, StorageResult};

/// Longest name accepted, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Display name of the person enrolled in a sensor slot.
///
/// Maps to the `subject_names` table; `id` is the template slot (0-999).
///
/// # Examples
///
/// ```
/// use fpterm_storage::models::SubjectName;
///
/// assert_eq!(SubjectName::normalize_name("  Ana   María "), "Ana María");
/// assert!(SubjectName::validate_name("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubjectName {
    /// Template slot on the sensor
    pub id: i64,

    /// Name as shown on the welcome screen
    pub name: String,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,

    /// Record last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl SubjectName {
    /// Slot as a [`TemplateId`], if the stored value is in range.
    pub fn template_id(&self) -> Option<TemplateId> {
        u16::try_from(self.id)
            .ok()
            .and_then(|raw| TemplateId::new(raw).ok())
    }

    /// Collapse inner whitespace runs and trim the ends.
    pub fn normalize_name(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Normalize and check a name before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Validation` for empty or overlong names.
    pub fn validate_name(name: &str) -> StorageResult<String> {
        let normalized = Self::normalize_name(name);
        if normalized.is_empty() {
            return Err(StorageError::Validation("name must not be empty".into()));
        }
        if normalized.chars().count() > MAX_NAME_LEN {
            return Err(StorageError::Validation(format!(
                "name longer than {MAX_NAME_LEN} characters"
            )));
        }
        Ok(normalized)
    }
}
