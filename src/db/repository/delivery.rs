use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::DeliveryStatus;
use crate::models::DeliveryRecord;

/// Store the outcome of one fired occurrence. A second attempt for the same
/// `(medicine_id, occurrence_index)` replaces the first.
pub fn record_delivery(conn: &Connection, record: &DeliveryRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO reminder_deliveries
         (id, reminder_set_id, medicine_id, occurrence_index, occurrence_date, status,
          provider_id, error, attempted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id.to_string(),
            record.reminder_set_id.to_string(),
            record.medicine_id.to_string(),
            record.occurrence_index,
            record.occurrence_date.to_string(),
            record.status.as_str(),
            record.provider_id,
            record.error,
            format_ts(&record.attempted_at),
        ],
    )?;
    Ok(())
}

/// Delivery log of one reminder set, oldest attempt first.
pub fn list_deliveries(
    conn: &Connection,
    reminder_set_id: &Uuid,
) -> Result<Vec<DeliveryRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, reminder_set_id, medicine_id, occurrence_index, occurrence_date, status,
         provider_id, error, attempted_at
         FROM reminder_deliveries WHERE reminder_set_id = ?1
         ORDER BY attempted_at ASC, occurrence_index ASC",
    )?;

    let rows = stmt.query_map(params![reminder_set_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, u32>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, set_id, med_id, index, date, status, provider_id, error, attempted_at) = row?;
        records.push(DeliveryRecord {
            id: parse_uuid(&id)?,
            reminder_set_id: parse_uuid(&set_id)?,
            medicine_id: parse_uuid(&med_id)?,
            occurrence_index: index,
            occurrence_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            status: DeliveryStatus::from_str(&status)?,
            provider_id,
            error,
            attempted_at: parse_ts(&attempted_at)?,
        });
    }
    Ok(records)
}
