//! Static gym catalog.
//!
//! A read-only reference resolver. The store records gym ids without
//! validating them against the catalog; resolution is strictly a consumer
//! concern (listings, map pins, session headers).

use crate::error::Result;
use crate::types::Gym;

/// In-memory catalog of known gyms.
pub struct GymCatalog {
    gyms: Vec<Gym>,
}

impl GymCatalog {
    /// Build a catalog from an already-loaded gym list.
    pub fn new(gyms: Vec<Gym>) -> Self {
        Self { gyms }
    }

    /// Parse a catalog from a JSON array document.
    pub fn from_json(json: &str) -> Result<Self> {
        let gyms: Vec<Gym> = serde_json::from_str(json)?;
        Ok(Self { gyms })
    }

    /// Look up a gym by id.
    pub fn gym_by_id(&self, id: &str) -> Option<&Gym> {
        self.gyms.iter().find(|g| g.id == id)
    }

    /// All gyms, in catalog order.
    pub fn all(&self) -> &[Gym] {
        &self.gyms
    }

    pub fn len(&self) -> usize {
        self.gyms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gyms.is_empty()
    }
}
