//! Reminder endpoints.
//!
//! - `POST /api/reminders`: create and schedule
//! - `GET /api/reminders`: paginated list (`page`, `limit`, `phoneNumber`, `includeInactive`)
//! - `GET /api/reminders/phone/:phoneNumber`: same list, filtered by phone
//! - `GET/PUT/DELETE /api/reminders/:id`: DELETE is a soft delete
//! - `GET /api/reminders/:id/jobs`: pending scheduled occurrences
//! - `GET /api/reminders/:id/deliveries`: per-occurrence delivery records

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson, Envelope};
use crate::db::repository::{NewMedicine, ReminderChanges, ReminderFilter};
use crate::models::enums::Recurrence;
use crate::models::{DeliveryRecord, ReminderSet};
use crate::reminders::{normalize_paging, NewReminder, ScheduledJob};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineInput {
    pub name: Option<String>,
    pub time: Option<String>,
    pub sent_status: Option<bool>,
    pub recurrence: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub phone_number: Option<String>,
    pub medicines: Option<Vec<MedicineInput>>,
    pub reminder_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderRequest {
    pub phone_number: Option<String>,
    pub medicines: Option<Vec<MedicineInput>>,
    pub reminder_days: Option<i64>,
    pub is_active: Option<bool>,
}

/// Query values stay strings so a malformed `page` falls back to the
/// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub phone_number: Option<String>,
    pub include_inactive: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: ReminderSet,
    pub scheduled_jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ReminderListResponse {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<ReminderSet>,
}

#[derive(Debug, Serialize)]
pub struct CountedList<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T: Serialize> CountedList<T> {
    fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// RFC 3339, or a local-less `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_medicines(inputs: Vec<MedicineInput>) -> Result<Vec<NewMedicine>, ApiError> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let position = i + 1;
            let name = input.name.unwrap_or_default();
            let time = input
                .time
                .as_deref()
                .ok_or_else(|| ApiError::BadRequest(format!("Medicine {position} has no time")))
                .and_then(|raw| {
                    parse_time(raw).ok_or_else(|| {
                        ApiError::BadRequest(format!("Medicine {position} has an invalid time: {raw}"))
                    })
                })?;
            let recurrence = match input.recurrence.as_deref().map(str::trim) {
                None | Some("") => Recurrence::Once,
                Some(raw) => raw
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid recurrence: {raw}")))?,
            };
            Ok(NewMedicine {
                name: name.trim().to_string(),
                time,
                sent_status: input.sent_status.unwrap_or(false),
                recurrence,
            })
        })
        .collect()
}

/// `0` or absent means "use the default"; negative or oversized values are rejected.
fn parse_reminder_days(raw: Option<i64>) -> Result<Option<u32>, ApiError> {
    match raw {
        None | Some(0) => Ok(None),
        Some(days) => u32::try_from(days)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid reminderDays: {days}"))),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid reminder id: {raw}")))
}

/// `POST /api/reminders`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(request): ApiJson<CreateReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>), ApiError> {
    let phone_number = request.phone_number.unwrap_or_default();
    let medicines = request.medicines.unwrap_or_default();
    if phone_number.trim().is_empty() || medicines.is_empty() {
        return Err(ApiError::BadRequest(
            "Phone number and at least one medicine are required".into(),
        ));
    }

    let input = NewReminder {
        phone_number: phone_number.trim().to_string(),
        medicines: parse_medicines(medicines)?,
        reminder_days: parse_reminder_days(request.reminder_days)?,
    };
    let (set, scheduled_jobs) = ctx.core.reminders.create(input)?;

    Ok((
        StatusCode::CREATED,
        Json(ReminderResponse {
            success: true,
            message: "Reminder created successfully",
            data: set,
            scheduled_jobs,
        }),
    ))
}

/// `GET /api/reminders`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReminderListResponse>, ApiError> {
    list_with_phone(&ctx, query.phone_number.clone(), &query)
}

/// `GET /api/reminders/phone/:phoneNumber`
pub async fn by_phone(
    State(ctx): State<ApiContext>,
    Path(phone_number): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ReminderListResponse>, ApiError> {
    list_with_phone(&ctx, Some(phone_number), &query)
}

fn list_with_phone(
    ctx: &ApiContext,
    phone_number: Option<String>,
    query: &ListQuery,
) -> Result<Json<ReminderListResponse>, ApiError> {
    let parse = |raw: &Option<String>| raw.as_deref().and_then(|v| v.trim().parse::<u64>().ok());
    let (page, limit) = normalize_paging(parse(&query.page), parse(&query.limit));
    let include_inactive = query
        .include_inactive
        .as_deref()
        .is_some_and(|v| matches!(v.trim(), "true" | "1"));

    let filter = ReminderFilter {
        phone_number: phone_number.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        active_only: !include_inactive,
    };
    let result = ctx.core.reminders.list(&filter, page, limit)?;

    Ok(Json(ReminderListResponse {
        success: true,
        count: result.items.len(),
        pagination: Pagination {
            total: result.total,
            page: result.page,
            pages: result.pages,
        },
        data: result.items,
    }))
}

/// `GET /api/reminders/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ReminderSet>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(Envelope::data(ctx.core.reminders.get(&id)?)))
}

/// `PUT /api/reminders/:id`: partial update; the schedule is rebuilt.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateReminderRequest>,
) -> Result<Json<ReminderResponse>, ApiError> {
    let id = parse_id(&id)?;
    let changes = ReminderChanges {
        phone_number: request
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        medicines: request.medicines.map(parse_medicines).transpose()?,
        reminder_days: parse_reminder_days(request.reminder_days)?,
        is_active: request.is_active,
    };
    let (set, scheduled_jobs) = ctx.core.reminders.update(&id, changes)?;

    Ok(Json(ReminderResponse {
        success: true,
        message: "Reminder updated successfully",
        data: set,
        scheduled_jobs,
    }))
}

/// `DELETE /api/reminders/:id`: deactivate and cancel pending jobs.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ReminderSet>>, ApiError> {
    let id = parse_id(&id)?;
    let set = ctx.core.reminders.deactivate(&id)?;
    Ok(Json(Envelope::with_message(set, "Reminder deleted successfully")))
}

/// `GET /api/reminders/:id/jobs`
pub async fn jobs(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<CountedList<ScheduledJob>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(CountedList::new(ctx.core.reminders.jobs(&id)?)))
}

/// `GET /api/reminders/:id/deliveries`
pub async fn deliveries(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<CountedList<DeliveryRecord>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(CountedList::new(ctx.core.reminders.deliveries(&id)?)))
}
