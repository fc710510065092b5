//! Medication reminders: validation and the create/update/deactivate flows.
//!
//! Every mutation that changes what should fire goes through
//! `ReminderService`, which persists first and then replaces the set's
//! jobs in the `ReminderScheduler`.

pub mod scheduler;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{
    count_reminder_sets, get_reminder_set, insert_reminder_set, list_deliveries, list_reminder_sets,
    set_reminder_active, update_reminder_set, NewMedicine, ReminderChanges, ReminderFilter,
};
use crate::db::{Database, DatabaseError};
use crate::models::{DeliveryRecord, ReminderSet, MAX_REMINDER_DAYS, MIN_REMINDER_DAYS};

pub use scheduler::{reminder_message, JobState, ReminderScheduler, ScheduledJob};

pub const DEFAULT_REMINDER_DAYS: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("{0}")]
    Validation(String),

    #[error("Reminder not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A reminder set as submitted for creation.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub phone_number: String,
    pub medicines: Vec<NewMedicine>,
    pub reminder_days: Option<u32>,
}

pub fn validate_phone_number(phone: &str) -> Result<(), ReminderError> {
    if phone.trim().is_empty() {
        return Err(ReminderError::Validation("Phone number is required".into()));
    }
    Ok(())
}

pub fn validate_reminder_days(days: u32) -> Result<(), ReminderError> {
    if !(MIN_REMINDER_DAYS..=MAX_REMINDER_DAYS).contains(&days) {
        return Err(ReminderError::Validation(format!(
            "reminderDays must be between {MIN_REMINDER_DAYS} and {MAX_REMINDER_DAYS}"
        )));
    }
    Ok(())
}

pub fn validate_medicines(medicines: &[NewMedicine]) -> Result<(), ReminderError> {
    if medicines.is_empty() {
        return Err(ReminderError::Validation(
            "Phone number and at least one medicine are required".into(),
        ));
    }
    if let Some(pos) = medicines.iter().position(|m| m.name.trim().is_empty()) {
        return Err(ReminderError::Validation(format!("Medicine {} has no name", pos + 1)));
    }
    Ok(())
}

/// One page of reminder sets, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderPage {
    pub items: Vec<ReminderSet>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

/// Clamp raw paging input: page ≥ 1, limit in `1..=MAX_PAGE_SIZE`.
pub fn normalize_paging(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

#[derive(Clone)]
pub struct ReminderService {
    db: Database,
    scheduler: ReminderScheduler,
}

impl ReminderService {
    pub fn new(db: Database, scheduler: ReminderScheduler) -> Self {
        Self { db, scheduler }
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Store a new set and schedule its occurrences.
    /// Returns the stored set and the number of jobs registered.
    pub fn create(&self, input: NewReminder) -> Result<(ReminderSet, usize), ReminderError> {
        validate_phone_number(&input.phone_number)?;
        validate_medicines(&input.medicines)?;
        let days = input.reminder_days.unwrap_or(DEFAULT_REMINDER_DAYS);
        validate_reminder_days(days)?;

        let set = self.db.with_conn(|conn| {
            insert_reminder_set(conn, &input.phone_number, &input.medicines, days, Utc::now())
        })?;
        let scheduled = self.scheduler.schedule(&set);
        tracing::info!(reminder_id = %set.id, scheduled, "Reminder created");
        Ok((set, scheduled))
    }

    pub fn get(&self, id: &Uuid) -> Result<ReminderSet, ReminderError> {
        self.db
            .with_conn(|conn| get_reminder_set(conn, id))?
            .ok_or(ReminderError::NotFound(*id))
    }

    pub fn list(&self, filter: &ReminderFilter, page: u64, limit: u64) -> Result<ReminderPage, ReminderError> {
        let offset = (page - 1).saturating_mul(limit);
        let (items, total) = self.db.with_conn(|conn| {
            let items = list_reminder_sets(conn, filter, offset, limit)?;
            let total = count_reminder_sets(conn, filter)?;
            Ok((items, total))
        })?;
        Ok(ReminderPage {
            items,
            total,
            page,
            pages: total.div_ceil(limit),
        })
    }

    /// Apply `changes` and replace the set's schedule. Deactivating through
    /// an update cancels every pending job.
    pub fn update(&self, id: &Uuid, changes: ReminderChanges) -> Result<(ReminderSet, usize), ReminderError> {
        if let Some(phone) = &changes.phone_number {
            validate_phone_number(phone)?;
        }
        if let Some(medicines) = &changes.medicines {
            validate_medicines(medicines)?;
        }
        if let Some(days) = changes.reminder_days {
            validate_reminder_days(days)?;
        }

        let set = self
            .db
            .with_conn(|conn| update_reminder_set(conn, id, &changes, Utc::now()))?
            .ok_or(ReminderError::NotFound(*id))?;
        let scheduled = self.scheduler.schedule(&set);
        tracing::info!(reminder_id = %id, scheduled, active = set.is_active, "Reminder updated");
        Ok((set, scheduled))
    }

    /// Soft delete: flip `is_active` off and cancel pending jobs.
    /// The record stays retrievable.
    pub fn deactivate(&self, id: &Uuid) -> Result<ReminderSet, ReminderError> {
        let found = self
            .db
            .with_conn(|conn| set_reminder_active(conn, id, false, Utc::now()))?;
        if !found {
            return Err(ReminderError::NotFound(*id));
        }
        let cancelled = self.scheduler.cancel(id);
        tracing::info!(reminder_id = %id, cancelled, "Reminder deactivated");
        self.get(id)
    }

    pub fn jobs(&self, id: &Uuid) -> Result<Vec<ScheduledJob>, ReminderError> {
        self.get(id)?;
        Ok(self.scheduler.pending_jobs(id))
    }

    pub fn deliveries(&self, id: &Uuid) -> Result<Vec<DeliveryRecord>, ReminderError> {
        self.get(id)?;
        Ok(self.db.with_conn(|conn| list_deliveries(conn, id))?)
    }
}
