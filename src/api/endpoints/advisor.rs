//! Generative-model endpoints (mounted at the root, not under `/api`).
//!
//! - `POST /generate-text`: multipart `image`, prescription OCR
//! - `POST /summarize-reports`: multipart `images` (up to 10 pages)
//! - `POST /generate-diet-plan`: `{ bmiCategory, ageGroup }`
//! - `POST /calculate-bmi`: `{ weight, height, age }`
//! - `POST /generate-meal-plan`: `{ age, height, weight }`

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::advisor::{ImageUpload, ReportSummary, MAX_REPORT_PAGES};
use crate::api::error::ApiError;
use crate::api::types::{positive_numbers, ApiContext, ApiJson, NumberIssue};

/// Upload size cap for the multipart routes.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Collect the non-empty files sent under `field_name`.
async fn collect_images(
    multipart: &mut Multipart,
    field_name: &str,
    max: usize,
) -> Result<Vec<ImageUpload>, ApiError> {
    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .filter(|m| m.starts_with("image/"))
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read upload {file_name}: {e}")))?;
        if data.is_empty() {
            continue;
        }
        if images.len() == max {
            return Err(ApiError::BadRequest(format!("Maximum {max} images per request")));
        }
        images.push(ImageUpload {
            file_name,
            mime_type,
            data: data.to_vec(),
        });
    }
    Ok(images)
}

#[derive(Serialize)]
pub struct TextResponse {
    pub text: String,
}

/// `POST /generate-text`
pub async fn generate_text(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TextResponse>, ApiError> {
    let mut multipart = multipart?;
    let images = collect_images(&mut multipart, "image", 1).await?;
    let image = images
        .first()
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;

    let text = ctx
        .core
        .advisor
        .extract_prescription_text(image)
        .await
        .map_err(|e| ApiError::from_advisor("Failed to process the image.", e))?;
    Ok(Json(TextResponse { text }))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    /// Only present (as `false`) when summarization failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(flatten)]
    pub report: ReportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /summarize-reports`
pub async fn summarize_reports(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let mut multipart = multipart?;
    let images = collect_images(&mut multipart, "images", MAX_REPORT_PAGES).await?;
    if images.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".into()));
    }
    tracing::info!(pages = images.len(), "Summarizing report images");

    let report = ctx
        .core
        .advisor
        .summarize_reports(&images)
        .await
        .map_err(|e| ApiError::from_advisor("Failed to process the report images.", e))?;

    let error = report.summary_error.clone();
    Ok(Json(SummaryResponse {
        success: error.as_ref().map(|_| false),
        report,
        error,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanRequest {
    pub bmi_category: Option<String>,
    pub age_group: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlanResponse {
    pub diet_plan: String,
}

/// `POST /generate-diet-plan`
pub async fn diet_plan(
    State(ctx): State<ApiContext>,
    ApiJson(request): ApiJson<DietPlanRequest>,
) -> Result<Json<DietPlanResponse>, ApiError> {
    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(category), Some(age_group)) = (non_blank(request.bmi_category), non_blank(request.age_group)) else {
        return Err(ApiError::BadRequest("bmiCategory and ageGroup are required.".into()));
    };

    let diet_plan = ctx
        .core
        .advisor
        .diet_plan(&category, &age_group)
        .await
        .map_err(|e| ApiError::from_advisor("Failed to generate diet plan.", e))?;
    Ok(Json(DietPlanResponse { diet_plan }))
}

/// Oldest age accepted by the BMI and meal-plan routes.
pub const MAX_AGE_YEARS: u32 = 120;

/// Age rounded to whole years, in `1..=MAX_AGE_YEARS`.
fn whole_years(age: f64) -> Result<u32, ApiError> {
    let years = age.round();
    if !(1.0..=f64::from(MAX_AGE_YEARS)).contains(&years) {
        return Err(ApiError::BadRequest(format!(
            "Age must be between 1 and {MAX_AGE_YEARS} years."
        )));
    }
    Ok(years as u32)
}

fn number_error(issue: NumberIssue, required: &str, invalid: &str) -> ApiError {
    match issue {
        NumberIssue::Missing => ApiError::BadRequest(required.into()),
        NumberIssue::Invalid => ApiError::BadRequest(invalid.into()),
    }
}

/// `POST /calculate-bmi`
pub async fn calculate_bmi(
    State(ctx): State<ApiContext>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let [weight, height, age] = positive_numbers([body.get("weight"), body.get("height"), body.get("age")])
        .map_err(|issue| {
            number_error(
                issue,
                "Weight, height, and age are required.",
                "Weight, height, and age must be valid numbers.",
            )
        })?;
    let age = whole_years(age)?;

    let recommendations = ctx
        .core
        .advisor
        .health_recommendations(weight, height, age)
        .await
        .map_err(|e| ApiError::from_advisor("Failed to calculate BMI and generate recommendations.", e))?;
    Ok(Json(Value::Object(recommendations)))
}

/// `POST /generate-meal-plan`
pub async fn meal_plan(
    State(ctx): State<ApiContext>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let [age, height, weight] = positive_numbers([body.get("age"), body.get("height"), body.get("weight")])
        .map_err(|issue| {
            number_error(
                issue,
                "Age, height, and weight are required.",
                "Age, height, and weight must be valid numbers.",
            )
        })?;
    let age = whole_years(age)?;

    let plan = ctx
        .core
        .advisor
        .meal_plan(age, height, weight)
        .await
        .map_err(|e| ApiError::from_advisor("Failed to generate meal plan.", e))?;
    Ok(Json(Value::Object(plan)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_rounds_to_whole_years() {
        assert_eq!(whole_years(34.4).unwrap(), 34);
        assert_eq!(whole_years(0.5).unwrap(), 1);
        assert_eq!(whole_years(120.0).unwrap(), 120);
    }

    #[test]
    fn age_outside_range_is_rejected() {
        assert!(matches!(whole_years(0.4), Err(ApiError::BadRequest(_))));
        assert!(matches!(whole_years(121.0), Err(ApiError::BadRequest(_))));
        assert!(matches!(whole_years(1e12), Err(ApiError::BadRequest(_))));
    }
}
