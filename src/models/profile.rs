use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BloodType;

/// The user's medical profile. One per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub primary_phone: String,
    pub secondary_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub blood_type: BloodType,
    pub allergies: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Secondary contact, if one is set and non-blank.
    pub fn secondary_contact(&self) -> Option<&str> {
        self.secondary_phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}
