use crate::constants::MAX_TEMPLATE_ID;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template slot on the sensor (0-999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct TemplateId(u16);

impl TemplateId {
    /// Create a new template ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTemplateId` if the ID is above 999.
    pub fn new(id: u16) -> Result<Self> {
        if id > MAX_TEMPLATE_ID {
            return Err(Error::InvalidTemplateId(format!(
                "Template ID must be 0-{MAX_TEMPLATE_ID}, got {id}"
            )));
        }
        Ok(TemplateId(id))
    }

    /// Get the raw template ID as u16.
    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Key under which the subject name for this slot is stored (`id007`).
    #[must_use]
    pub fn name_key(&self) -> String {
        format!("id{:03}", self.0)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TemplateId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTemplateId(format!("Invalid template ID: {s}")))?;
        TemplateId::new(id)
    }
}

impl TryFrom<u16> for TemplateId {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        TemplateId::new(value)
    }
}

impl From<TemplateId> for u16 {
    fn from(id: TemplateId) -> Self {
        id.0
    }
}

/// Read-only, non-blocking view of subject names by template slot.
///
/// Implementations must answer from memory; the scan coordinator calls this
/// from its poll step.
pub trait NameLookup: Send + Sync {
    fn name_for(&self, id: TemplateId) -> Option<String>;
}
