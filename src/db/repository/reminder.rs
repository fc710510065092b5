use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::Recurrence;
use crate::models::{Medicine, ReminderSet};

/// A medicine as submitted by a client, before it gets an id.
#[derive(Debug, Clone)]
pub struct NewMedicine {
    pub name: String,
    pub time: DateTime<Utc>,
    pub sent_status: bool,
    pub recurrence: Recurrence,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderFilter {
    pub phone_number: Option<String>,
    pub active_only: bool,
}

/// Partial update. `None` leaves the stored value untouched; `medicines`
/// replaces the whole list when present.
#[derive(Debug, Clone, Default)]
pub struct ReminderChanges {
    pub phone_number: Option<String>,
    pub medicines: Option<Vec<NewMedicine>>,
    pub reminder_days: Option<u32>,
    pub is_active: Option<bool>,
}

pub fn insert_reminder_set(
    conn: &Connection,
    phone_number: &str,
    medicines: &[NewMedicine],
    reminder_days: u32,
    now: DateTime<Utc>,
) -> Result<ReminderSet, DatabaseError> {
    let id = Uuid::new_v4();
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO reminder_sets (id, phone_number, reminder_days, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        params![id.to_string(), phone_number.trim(), reminder_days, format_ts(&now)],
    )?;
    let stored = insert_medicines(&tx, &id, medicines)?;

    tx.commit()?;

    Ok(ReminderSet {
        id,
        phone_number: phone_number.trim().to_string(),
        medicines: stored,
        reminder_days,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_reminder_set(conn: &Connection, id: &Uuid) -> Result<Option<ReminderSet>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, phone_number, reminder_days, is_active, created_at, updated_at
         FROM reminder_sets WHERE id = ?1",
        params![id.to_string()],
        reminder_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(reminder_from_row(conn, row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Newest first. An offset past SQLite's integer range is an empty page.
pub fn list_reminder_sets(
    conn: &Connection,
    filter: &ReminderFilter,
    offset: u64,
    limit: u64,
) -> Result<Vec<ReminderSet>, DatabaseError> {
    let Ok(offset) = i64::try_from(offset) else {
        return Ok(Vec::new());
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT id, phone_number, reminder_days, is_active, created_at, updated_at
         FROM reminder_sets
         WHERE (?1 IS NULL OR phone_number = ?1) AND (?2 = 0 OR is_active = 1)
         ORDER BY created_at DESC
         LIMIT ?3 OFFSET ?4",
    )?;

    let rows = stmt.query_map(
        params![
            filter.phone_number,
            filter.active_only as i32,
            limit,
            offset
        ],
        reminder_row_from_rusqlite,
    )?;

    let mut sets = Vec::new();
    for row in rows {
        sets.push(reminder_from_row(conn, row?)?);
    }
    Ok(sets)
}

pub fn count_reminder_sets(conn: &Connection, filter: &ReminderFilter) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reminder_sets
         WHERE (?1 IS NULL OR phone_number = ?1) AND (?2 = 0 OR is_active = 1)",
        params![filter.phone_number, filter.active_only as i32],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Apply `changes` and return the stored result, or `None` if the id is unknown.
pub fn update_reminder_set(
    conn: &Connection,
    id: &Uuid,
    changes: &ReminderChanges,
    now: DateTime<Utc>,
) -> Result<Option<ReminderSet>, DatabaseError> {
    let Some(current) = get_reminder_set(conn, id)? else {
        return Ok(None);
    };

    let phone_number = changes
        .phone_number
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.phone_number)
        .to_string();
    let reminder_days = changes.reminder_days.unwrap_or(current.reminder_days);
    let is_active = changes.is_active.unwrap_or(current.is_active);

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE reminder_sets SET phone_number = ?2, reminder_days = ?3, is_active = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            id.to_string(),
            phone_number,
            reminder_days,
            is_active as i32,
            format_ts(&now)
        ],
    )?;

    let medicines = match &changes.medicines {
        Some(replacement) => {
            tx.execute(
                "DELETE FROM medicines WHERE reminder_set_id = ?1",
                params![id.to_string()],
            )?;
            insert_medicines(&tx, id, replacement)?
        }
        None => current.medicines,
    };
    tx.commit()?;

    Ok(Some(ReminderSet {
        id: *id,
        phone_number,
        medicines,
        reminder_days,
        is_active,
        created_at: current.created_at,
        updated_at: now,
    }))
}

/// Flip `is_active`. Returns `false` if the id is unknown.
pub fn set_reminder_active(
    conn: &Connection,
    id: &Uuid,
    active: bool,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE reminder_sets SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), active as i32, format_ts(&now)],
    )?;
    Ok(changed > 0)
}

/// Set `sent_status` on one medicine. Returns `false` if no such medicine
/// belongs to the set (for instance after its list was replaced).
pub fn mark_medicine_sent(
    conn: &Connection,
    reminder_set_id: &Uuid,
    medicine_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicines SET sent_status = 1 WHERE id = ?1 AND reminder_set_id = ?2",
        params![medicine_id.to_string(), reminder_set_id.to_string()],
    )?;
    Ok(changed > 0)
}

fn insert_medicines(
    conn: &Connection,
    reminder_set_id: &Uuid,
    medicines: &[NewMedicine],
) -> Result<Vec<Medicine>, DatabaseError> {
    let mut stored = Vec::with_capacity(medicines.len());
    for (position, med) in medicines.iter().enumerate() {
        let medicine = Medicine {
            id: Uuid::new_v4(),
            name: med.name.trim().to_string(),
            time: med.time,
            sent_status: med.sent_status,
            recurrence: med.recurrence,
        };
        conn.execute(
            "INSERT INTO medicines (id, reminder_set_id, position, name, time, sent_status, recurrence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                medicine.id.to_string(),
                reminder_set_id.to_string(),
                position as i64,
                medicine.name,
                format_ts(&medicine.time),
                medicine.sent_status as i32,
                medicine.recurrence.as_str(),
            ],
        )?;
        stored.push(medicine);
    }
    Ok(stored)
}

fn get_medicines(conn: &Connection, reminder_set_id: &str) -> Result<Vec<Medicine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, time, sent_status, recurrence
         FROM medicines WHERE reminder_set_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![reminder_set_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut medicines = Vec::new();
    for row in rows {
        let (id, name, time, sent_status, recurrence) = row?;
        medicines.push(Medicine {
            id: parse_uuid(&id)?,
            name,
            time: parse_ts(&time)?,
            sent_status: sent_status != 0,
            recurrence: Recurrence::from_str(&recurrence)?,
        });
    }
    Ok(medicines)
}

// Internal row type for ReminderSet mapping
struct ReminderRow {
    id: String,
    phone_number: String,
    reminder_days: i64,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

fn reminder_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ReminderRow, rusqlite::Error> {
    Ok(ReminderRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        reminder_days: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn reminder_from_row(conn: &Connection, row: ReminderRow) -> Result<ReminderSet, DatabaseError> {
    let medicines = get_medicines(conn, &row.id)?;
    Ok(ReminderSet {
        id: parse_uuid(&row.id)?,
        phone_number: row.phone_number,
        medicines,
        reminder_days: u32::try_from(row.reminder_days)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        is_active: row.is_active != 0,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn med(name: &str, time: DateTime<Utc>) -> NewMedicine {
        NewMedicine {
            name: name.into(),
            time,
            sent_status: false,
            recurrence: Recurrence::Daily,
        }
    }

    #[test]
    fn insert_and_fetch_preserves_medicine_order() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let set = insert_reminder_set(
            &conn,
            " 9876543210 ",
            &[med("Aspirin", now), med("Metformin", now + Duration::hours(2))],
            3,
            now,
        )
        .unwrap();

        let fetched = get_reminder_set(&conn, &set.id).unwrap().unwrap();
        assert_eq!(fetched.phone_number, "9876543210");
        assert_eq!(fetched.reminder_days, 3);
        assert!(fetched.is_active);
        let names: Vec<_> = fetched.medicines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Aspirin", "Metformin"]);
        assert_eq!(fetched.medicines[0].recurrence, Recurrence::Daily);
    }

    #[test]
    fn unknown_id_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_reminder_set(&conn, &Uuid::new_v4()).unwrap().is_none());
        let changes = ReminderChanges::default();
        assert!(update_reminder_set(&conn, &Uuid::new_v4(), &changes, Utc::now())
            .unwrap()
            .is_none());
        assert!(!set_reminder_active(&conn, &Uuid::new_v4(), false, Utc::now()).unwrap());
    }

    #[test]
    fn reminder_days_out_of_range_rejected_by_schema() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        assert!(insert_reminder_set(&conn, "1", &[med("A", now)], 31, now).is_err());
        assert!(insert_reminder_set(&conn, "1", &[med("A", now)], 0, now).is_err());
    }

    #[test]
    fn list_filters_sorts_and_paginates() {
        let conn = open_memory_database().unwrap();
        let base = Utc::now();
        for i in 0..5 {
            let phone = if i % 2 == 0 { "111" } else { "222" };
            insert_reminder_set(&conn, phone, &[med("A", base)], 1, base + Duration::seconds(i)).unwrap();
        }

        let all = ReminderFilter { phone_number: None, active_only: true };
        assert_eq!(count_reminder_sets(&conn, &all).unwrap(), 5);

        let page1 = list_reminder_sets(&conn, &all, 0, 2).unwrap();
        let page3 = list_reminder_sets(&conn, &all, 4, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page3.len(), 1);
        assert!(page1[0].created_at > page1[1].created_at);

        let by_phone = ReminderFilter { phone_number: Some("111".into()), active_only: true };
        assert_eq!(count_reminder_sets(&conn, &by_phone).unwrap(), 3);
        assert!(list_reminder_sets(&conn, &by_phone, 0, 10)
            .unwrap()
            .iter()
            .all(|s| s.phone_number == "111"));
    }

    #[test]
    fn inactive_sets_hidden_from_active_listing_but_fetchable() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let set = insert_reminder_set(&conn, "111", &[med("A", now)], 1, now).unwrap();
        assert!(set_reminder_active(&conn, &set.id, false, now).unwrap());

        let active = ReminderFilter { phone_number: None, active_only: true };
        assert_eq!(count_reminder_sets(&conn, &active).unwrap(), 0);

        let fetched = get_reminder_set(&conn, &set.id).unwrap().unwrap();
        assert!(!fetched.is_active);
    }

    #[test]
    fn update_replaces_medicines_wholesale() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let set = insert_reminder_set(&conn, "111", &[med("A", now), med("B", now)], 2, now).unwrap();

        let changes = ReminderChanges {
            medicines: Some(vec![med("C", now)]),
            reminder_days: Some(5),
            ..Default::default()
        };
        let later = now + Duration::minutes(1);
        let updated = update_reminder_set(&conn, &set.id, &changes, later).unwrap().unwrap();

        assert_eq!(updated.medicines.len(), 1);
        assert_eq!(updated.medicines[0].name, "C");
        assert_eq!(updated.reminder_days, 5);
        assert_eq!(updated.phone_number, "111");
        assert_eq!(updated.created_at, set.created_at);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM medicines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn mark_medicine_sent_only_touches_matching_set() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let set = insert_reminder_set(&conn, "111", &[med("A", now)], 1, now).unwrap();
        let medicine_id = set.medicines[0].id;

        assert!(!mark_medicine_sent(&conn, &Uuid::new_v4(), &medicine_id).unwrap());
        assert!(mark_medicine_sent(&conn, &set.id, &medicine_id).unwrap());

        let fetched = get_reminder_set(&conn, &set.id).unwrap().unwrap();
        assert!(fetched.medicines[0].sent_status);
    }
}
