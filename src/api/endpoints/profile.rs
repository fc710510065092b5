//! Profile endpoints.
//!
//! - `GET /api/profile`: the stored profile, or `data: null`
//! - `POST /api/profile`: create or overwrite
//! - `DELETE /api/profile`

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{Acknowledgement, ApiContext, ApiJson, Envelope};
use crate::db::repository::{delete_profile, get_profile, upsert_profile, ProfileFields};
use crate::models::enums::BloodType;
use crate::models::Profile;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub address: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ProfileRequest {
    fn into_fields(self) -> Result<ProfileFields, ApiError> {
        let (Some(name), Some(primary_phone)) = (required(self.name), required(self.primary_phone)) else {
            return Err(ApiError::BadRequest(
                "Name and primary phone number are required".into(),
            ));
        };
        let blood_type = match self.blood_type.as_deref().map(str::trim) {
            None | Some("") => BloodType::Unspecified,
            Some(raw) => raw
                .to_ascii_uppercase()
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Invalid blood type: {raw}")))?,
        };

        Ok(ProfileFields {
            name,
            primary_phone,
            secondary_phone: self.secondary_phone,
            medical_conditions: self.medical_conditions,
            medications: self.medications,
            blood_type,
            allergies: self.allergies,
            address: self.address,
        })
    }
}

/// `GET /api/profile`
pub async fn get(State(ctx): State<ApiContext>) -> Result<Json<Envelope<Option<Profile>>>, ApiError> {
    let profile = ctx.core.db.with_conn(get_profile)?;
    Ok(Json(match profile {
        Some(profile) => Envelope::data(Some(profile)),
        None => Envelope::with_message(None, "No profile found"),
    }))
}

/// `POST /api/profile`: create the profile or overwrite every field.
pub async fn upsert(
    State(ctx): State<ApiContext>,
    ApiJson(request): ApiJson<ProfileRequest>,
) -> Result<Json<Envelope<Profile>>, ApiError> {
    let fields = request.into_fields()?;
    let profile = ctx
        .core
        .db
        .with_conn(|conn| upsert_profile(conn, &fields, Utc::now()))?;
    tracing::info!(profile_id = %profile.id, "Profile saved");
    Ok(Json(Envelope::with_message(profile, "Profile updated successfully")))
}

/// `DELETE /api/profile`
pub async fn delete(State(ctx): State<ApiContext>) -> Result<Json<Acknowledgement>, ApiError> {
    if !ctx.core.db.with_conn(delete_profile)? {
        return Err(ApiError::NotFound("Profile not found".into()));
    }
    tracing::info!("Profile deleted");
    Ok(Json(Acknowledgement::new("Profile deleted successfully")))
}
