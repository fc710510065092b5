use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DeliveryStatus, Recurrence};

/// Lower and upper bound for `ReminderSet::reminder_days`.
pub const MIN_REMINDER_DAYS: u32 = 1;
pub const MAX_REMINDER_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    /// First occurrence. Later occurrences are this instant plus whole days.
    pub time: DateTime<Utc>,
    pub sent_status: bool,
    pub recurrence: Recurrence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSet {
    pub id: Uuid,
    pub phone_number: String,
    pub medicines: Vec<Medicine>,
    pub reminder_days: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one fired occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub reminder_set_id: Uuid,
    pub medicine_id: Uuid,
    pub occurrence_index: u32,
    pub occurrence_date: NaiveDate,
    pub status: DeliveryStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}
