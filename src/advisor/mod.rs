//! HealthAdvisor: generative-model wrappers for prescriptions, report
//! summaries, BMI advice and meal plans.
//!
//! The model is injected behind `GenerativeModel`; with none configured
//! every operation fails with `AdvisorError::NotConfigured`.

pub mod bmi;
pub mod gemini;
pub mod parser;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub use bmi::{age_group, calculate_bmi, classify_bmi};
pub use gemini::GeminiClient;

/// Upper bound on pages per summary request.
pub const MAX_REPORT_PAGES: usize = 10;

pub const PAGE_SEPARATOR: &str = "\n\n==== NEXT PAGE ====\n\n";

const PRESCRIPTION_PROMPT: &str = "Extract text from the given doctor's prescription";
const REPORT_PAGE_PROMPT: &str = "Extract all text from this medical report image as accurately as possible.";

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("Generative model is not configured")]
    NotConfigured,

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Model provider returned error (status {status}): {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Failed to extract text from any of the uploaded images")]
    NoPagesExtracted,
}

/// One piece of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, parts: &[Part]) -> Result<String, AdvisorError>;
}

/// An uploaded image.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    fn part(&self) -> Part {
        Part::Image {
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Result of a multi-page summary. `summary` is `None` when extraction
/// worked but summarization did not; `summary_error` then says why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub extracted_texts: Vec<String>,
    pub combined_text: String,
    pub summary: Option<String>,
    pub page_count: usize,
    #[serde(skip)]
    pub summary_error: Option<String>,
}

pub struct HealthAdvisor {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl HealthAdvisor {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.model_name())
    }

    async fn generate(&self, parts: &[Part]) -> Result<String, AdvisorError> {
        let model = self.model.as_ref().ok_or(AdvisorError::NotConfigured)?;
        model.generate(parts).await
    }

    async fn generate_text(&self, prompt: String) -> Result<String, AdvisorError> {
        self.generate(&[Part::Text(prompt)]).await
    }

    pub async fn extract_prescription_text(&self, image: &ImageUpload) -> Result<String, AdvisorError> {
        self.generate(&[Part::Text(PRESCRIPTION_PROMPT.into()), image.part()])
            .await
    }

    /// Extract each page, then summarize the pages together. Pages that fail
    /// extraction are skipped.
    pub async fn summarize_reports(&self, pages: &[ImageUpload]) -> Result<ReportSummary, AdvisorError> {
        if self.model.is_none() {
            return Err(AdvisorError::NotConfigured);
        }

        let mut extracted_texts = Vec::new();
        for page in pages.iter().take(MAX_REPORT_PAGES) {
            match self
                .generate(&[Part::Text(REPORT_PAGE_PROMPT.into()), page.part()])
                .await
            {
                Ok(text) => {
                    tracing::info!(file = %page.file_name, "Extracted report page");
                    extracted_texts.push(text);
                }
                Err(e) => {
                    tracing::warn!(file = %page.file_name, error = %e, "Report page extraction failed");
                }
            }
        }
        if extracted_texts.is_empty() {
            return Err(AdvisorError::NoPagesExtracted);
        }

        let combined_text = extracted_texts.join(PAGE_SEPARATOR);
        let prompt = format!(
            "This is a medical report text extracted from multiple pages. Please provide a \
             comprehensive summary of the key findings, diagnoses, and recommendations. Focus on \
             the most important medical information:\n\n{combined_text}"
        );

        let (summary, summary_error) = match self.generate_text(prompt).await {
            Ok(summary) => (Some(summary), None),
            Err(e) => {
                tracing::error!(error = %e, "Report summarization failed");
                (
                    None,
                    Some("Failed to generate summary, but text extraction succeeded".to_string()),
                )
            }
        };

        Ok(ReportSummary {
            page_count: extracted_texts.len(),
            extracted_texts,
            combined_text,
            summary,
            summary_error,
        })
    }

    pub async fn diet_plan(&self, bmi_category: &str, age_group: &str) -> Result<String, AdvisorError> {
        self.generate_text(format!(
            "Create a healthy diet plan for someone who is {bmi_category} and in the {age_group} age group."
        ))
        .await
    }

    /// BMI, category, and the model's diet/exercise/advice object (or the
    /// fallback payload when no JSON object can be read from its answer).
    pub async fn health_recommendations(
        &self,
        weight_kg: f64,
        height_cm: f64,
        age: u32,
    ) -> Result<Map<String, Value>, AdvisorError> {
        let bmi = calculate_bmi(weight_kg, height_cm);
        let category = classify_bmi(bmi);

        let prompt = format!(
            "I am {age} years old with a BMI of {bmi:.1} which is classified as \"{category}\".\n\
             My weight is {weight_kg}kg and my height is {height_cm}cm.\n\
             Please provide me with:\n\
             1. A personalized diet plan with specific breakfast, lunch, and dinner recommendations\n\
             2. An exercise routine appropriate for my BMI and age\n\
             3. General health advice based on my metrics\n\n\
             Format your response as JSON with the following structure:\n\
             {{\n  \"dietPlan\": {{\n    \"breakfast\": \"...\",\n    \"lunch\": \"...\",\n    \"dinner\": \"...\"\n  }},\n  \
             \"exercisePlan\": \"...\",\n  \"healthAdvice\": \"...\"\n}}"
        );
        let response = self.generate_text(prompt).await?;

        let body = parser::extract_json_object(&response).unwrap_or_else(|| {
            tracing::warn!("No JSON in recommendations response, using fallback");
            parser::fallback_recommendations()
        });

        let mut payload = Map::new();
        payload.insert("bmi".into(), Value::from(bmi));
        payload.insert("bmiCategory".into(), Value::from(category));
        payload.extend(body);
        Ok(payload)
    }

    /// Seven-day meal plan. The fallback payload carries the raw answer.
    pub async fn meal_plan(
        &self,
        age: u32,
        height_cm: f64,
        weight_kg: f64,
    ) -> Result<Map<String, Value>, AdvisorError> {
        let bmi = calculate_bmi(weight_kg, height_cm);
        let category = classify_bmi(bmi);
        let group = age_group(age);

        let prompt = format!(
            "I am {age} years old with a BMI of {bmi:.1} which is classified as \"{category}\".\n\
             My weight is {weight_kg}kg and my height is {height_cm}cm.\n\n\
             Please create a comprehensive and detailed 7-day meal plan that is:\n\
             - Nutritionally balanced\n\
             - Appropriate for my BMI category ({category})\n\
             - Suitable for my age group ({group})\n\
             - Includes specific food suggestions\n\
             - Includes approximate calorie counts\n\n\
             Format your response as JSON with the following structure:\n\
             {{\n  \"overview\": \"Brief explanation of the meal plan's focus and goals\",\n  \
             \"nutritionalGuidelines\": \"Key nutritional guidelines I should follow\",\n  \
             \"weeklyPlan\": [\n    {{\n      \"day\": \"Monday\",\n      \"meals\": {{\n        \
             \"breakfast\": {{\"description\": \"...\", \"calories\": \"...\"}},\n        \
             \"lunch\": {{\"description\": \"...\", \"calories\": \"...\"}},\n        \
             \"dinner\": {{\"description\": \"...\", \"calories\": \"...\"}},\n        \
             \"snacks\": {{\"description\": \"...\", \"calories\": \"...\"}}\n      }}\n    }}\n  ],\n  \
             \"tips\": [\"tip1\", \"tip2\", \"tip3\"]\n}}\n\
             Include all seven days, Monday through Sunday."
        );
        let response = self.generate_text(prompt).await?;

        let body = parser::extract_json_object(&response).unwrap_or_else(|| {
            tracing::warn!("No JSON in meal plan response, using fallback");
            parser::fallback_meal_plan(&response)
        });

        let mut payload = Map::new();
        payload.insert("bmi".into(), Value::from(bmi));
        payload.insert("bmiCategory".into(), Value::from(category));
        payload.insert("ageGroup".into(), Value::from(group));
        payload.extend(body);
        Ok(payload)
    }
}

/// Mock generative model for testing: scripted answers, recorded prompts.
pub struct MockGenerativeModel {
    default: Option<String>,
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<Part>>>,
}

impl MockGenerativeModel {
    /// Always answers `response`.
    pub fn new(response: &str) -> Self {
        Self {
            default: Some(response.to_string()),
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers in order; `Err` entries fail that call. Once the script is
    /// used up every call fails with `EmptyResponse`.
    pub fn scripted(answers: Vec<Result<&str, &str>>) -> Self {
        Self {
            default: None,
            script: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt received so far.
    pub fn calls(&self) -> Vec<Vec<Part>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, parts: &[Part]) -> Result<String, AdvisorError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(parts.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.default) {
            (Some(Ok(text)), _) => Ok(text),
            (Some(Err(message)), _) => Err(AdvisorError::Http(message)),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(AdvisorError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_model(model: MockGenerativeModel) -> (HealthAdvisor, Arc<MockGenerativeModel>) {
        let model = Arc::new(model);
        (HealthAdvisor::new(Some(model.clone())), model)
    }

    fn page(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.into(),
            mime_type: "image/jpeg".into(),
            data: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[tokio::test]
    async fn unconfigured_advisor_fails() {
        let advisor = HealthAdvisor::new(None);
        assert!(!advisor.is_configured());
        let err = advisor.diet_plan("Normal", "30-39").await.unwrap_err();
        assert!(matches!(err, AdvisorError::NotConfigured));
        let err = advisor.summarize_reports(&[page("a.jpg")]).await.unwrap_err();
        assert!(matches!(err, AdvisorError::NotConfigured));
    }

    #[tokio::test]
    async fn prescription_prompt_carries_image() {
        let (advisor, model) = with_model(MockGenerativeModel::new("Amoxicillin 500mg"));
        let text = advisor.extract_prescription_text(&page("rx.jpg")).await.unwrap();
        assert_eq!(text, "Amoxicillin 500mg");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], Part::Text(PRESCRIPTION_PROMPT.into()));
        assert!(matches!(&calls[0][1], Part::Image { mime_type, .. } if mime_type == "image/jpeg"));
    }

    #[tokio::test]
    async fn summary_skips_failed_pages() {
        let (advisor, _) = with_model(MockGenerativeModel::scripted(vec![
            Ok("Page one"),
            Err("timeout"),
            Ok("Page three"),
            Ok("Summary text"),
        ]));

        let summary = advisor
            .summarize_reports(&[page("1.jpg"), page("2.jpg"), page("3.jpg")])
            .await
            .unwrap();
        assert_eq!(summary.page_count, 2);
        assert_eq!(summary.combined_text, "Page one\n\n==== NEXT PAGE ====\n\nPage three");
        assert_eq!(summary.summary.as_deref(), Some("Summary text"));
        assert!(summary.summary_error.is_none());
    }

    #[tokio::test]
    async fn summary_failure_keeps_texts() {
        let (advisor, _) = with_model(MockGenerativeModel::scripted(vec![Ok("Only page"), Err("quota")]));
        let summary = advisor.summarize_reports(&[page("1.jpg")]).await.unwrap();
        assert!(summary.summary.is_none());
        assert!(summary.summary_error.is_some());
        assert_eq!(summary.extracted_texts, ["Only page"]);
    }

    #[tokio::test]
    async fn no_extracted_pages_is_error() {
        let (advisor, _) = with_model(MockGenerativeModel::scripted(vec![Err("a"), Err("b")]));
        let err = advisor
            .summarize_reports(&[page("1.jpg"), page("2.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::NoPagesExtracted));
    }

    #[tokio::test]
    async fn recommendations_merge_model_json() {
        let answer = "Sure!\n{\"dietPlan\": {\"breakfast\": \"Oats\", \"lunch\": \"Dal\", \"dinner\": \"Soup\"}, \"exercisePlan\": \"Walk 30 min\", \"healthAdvice\": \"Sleep well\"}";
        let (advisor, model) = with_model(MockGenerativeModel::new(answer));

        let payload = advisor.health_recommendations(70.0, 175.0, 34).await.unwrap();
        assert_eq!(payload["bmi"], 22.9);
        assert_eq!(payload["bmiCategory"], "Normal");
        assert_eq!(payload["dietPlan"]["breakfast"], "Oats");
        assert_eq!(payload["exercisePlan"], "Walk 30 min");

        let calls = model.calls();
        let Part::Text(prompt) = &calls[0][0] else {
            panic!("expected text prompt");
        };
        assert!(prompt.contains("BMI of 22.9"));
        assert!(prompt.contains("\"Normal\""));
    }

    #[tokio::test]
    async fn recommendations_fall_back_without_json() {
        let (advisor, _) = with_model(MockGenerativeModel::new("Eat balanced meals."));
        let payload = advisor.health_recommendations(95.0, 170.0, 50).await.unwrap();
        assert_eq!(payload["bmiCategory"], "Obese");
        assert_eq!(
            payload["dietPlan"]["dinner"],
            "Failed to generate specific recommendations"
        );
    }

    #[tokio::test]
    async fn meal_plan_includes_age_group_and_raw_fallback() {
        let (advisor, _) = with_model(MockGenerativeModel::new("I cannot format this."));
        let payload = advisor.meal_plan(34, 180.0, 50.0).await.unwrap();
        assert_eq!(payload["ageGroup"], "30-39");
        assert_eq!(payload["bmiCategory"], "Underweight");
        assert_eq!(payload["rawResponse"], "I cannot format this.");

        let answer = r#"{"overview": "Lean protein", "weeklyPlan": [], "tips": ["Hydrate"]}"#;
        let (advisor, _) = with_model(MockGenerativeModel::new(answer));
        let payload = advisor.meal_plan(34, 180.0, 50.0).await.unwrap();
        assert_eq!(payload["overview"], "Lean protein");
        assert!(payload.get("rawResponse").is_none());
    }
}
