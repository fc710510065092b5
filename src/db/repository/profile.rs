use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::BloodType;
use crate::models::Profile;

/// Editable profile fields. Empty optional strings are stored as NULL.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub name: String,
    pub primary_phone: String,
    pub secondary_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub blood_type: BloodType,
    pub allergies: Option<String>,
    pub address: Option<String>,
}

/// The singleton profile, if one exists.
pub fn get_profile(conn: &Connection) -> Result<Option<Profile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, primary_phone, secondary_phone, medical_conditions, medications,
         blood_type, allergies, address, created_at, updated_at
         FROM profile ORDER BY created_at ASC LIMIT 1",
        [],
        |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                name: row.get(1)?,
                primary_phone: row.get(2)?,
                secondary_phone: row.get(3)?,
                medical_conditions: row.get(4)?,
                medications: row.get(5)?,
                blood_type: row.get(6)?,
                allergies: row.get(7)?,
                address: row.get(8)?,
                created_at: row.get(9)?,
                updated_at: row.get(10)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create the profile, or overwrite every editable field of the existing one.
///
/// Keeps `id` and `created_at` on update; `updated_at` is always `now`.
pub fn upsert_profile(
    conn: &Connection,
    fields: &ProfileFields,
    now: DateTime<Utc>,
) -> Result<Profile, DatabaseError> {
    let existing = get_profile(conn)?;
    let (id, created_at) = match &existing {
        Some(p) => (p.id, p.created_at),
        None => (Uuid::new_v4(), now),
    };

    let profile = Profile {
        id,
        name: fields.name.trim().to_string(),
        primary_phone: fields.primary_phone.trim().to_string(),
        secondary_phone: non_blank(&fields.secondary_phone),
        medical_conditions: non_blank(&fields.medical_conditions),
        medications: non_blank(&fields.medications),
        blood_type: fields.blood_type,
        allergies: non_blank(&fields.allergies),
        address: non_blank(&fields.address),
        created_at,
        updated_at: now,
    };

    if profile.name.is_empty() || profile.primary_phone.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "name and primary phone are required".into(),
        ));
    }

    if existing.is_some() {
        conn.execute(
            "UPDATE profile SET name = ?2, primary_phone = ?3, secondary_phone = ?4,
             medical_conditions = ?5, medications = ?6, blood_type = ?7, allergies = ?8,
             address = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                profile.id.to_string(),
                profile.name,
                profile.primary_phone,
                profile.secondary_phone,
                profile.medical_conditions,
                profile.medications,
                profile.blood_type.as_str(),
                profile.allergies,
                profile.address,
                format_ts(&profile.updated_at),
            ],
        )?;
    } else {
        conn.execute(
            "INSERT INTO profile (id, name, primary_phone, secondary_phone, medical_conditions,
             medications, blood_type, allergies, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                profile.id.to_string(),
                profile.name,
                profile.primary_phone,
                profile.secondary_phone,
                profile.medical_conditions,
                profile.medications,
                profile.blood_type.as_str(),
                profile.allergies,
                profile.address,
                format_ts(&profile.created_at),
                format_ts(&profile.updated_at),
            ],
        )?;
    }

    Ok(profile)
}

/// Delete the profile. Returns `false` when there was nothing to delete.
pub fn delete_profile(conn: &Connection) -> Result<bool, DatabaseError> {
    match get_profile(conn)? {
        Some(profile) => {
            conn.execute("DELETE FROM profile WHERE id = ?1", params![profile.id.to_string()])?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// Internal row type for Profile mapping
struct ProfileRow {
    id: String,
    name: String,
    primary_phone: String,
    secondary_phone: Option<String>,
    medical_conditions: Option<String>,
    medications: Option<String>,
    blood_type: String,
    allergies: Option<String>,
    address: Option<String>,
    created_at: String,
    updated_at: String,
}

fn profile_from_row(row: ProfileRow) -> Result<Profile, DatabaseError> {
    Ok(Profile {
        id: parse_uuid(&row.id)?,
        name: row.name,
        primary_phone: row.primary_phone,
        secondary_phone: row.secondary_phone,
        medical_conditions: row.medical_conditions,
        medications: row.medications,
        blood_type: BloodType::from_str(&row.blood_type)?,
        allergies: row.allergies,
        address: row.address,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
