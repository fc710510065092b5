//! Pull a JSON object out of free-form model output, and the payloads
//! used when that fails.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

/// First `{` through last `}`: models often wrap JSON in prose or fences.
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("JSON object pattern is valid"));

pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let candidate = JSON_OBJECT.find(text)?.as_str();
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Model output contained malformed JSON");
            None
        }
    }
}

const NO_RECOMMENDATIONS: &str = "Failed to generate specific recommendations";

pub fn fallback_recommendations() -> Map<String, Value> {
    let value = json!({
        "dietPlan": {
            "breakfast": NO_RECOMMENDATIONS,
            "lunch": NO_RECOMMENDATIONS,
            "dinner": NO_RECOMMENDATIONS
        },
        "exercisePlan": "Failed to generate exercise recommendations",
        "healthAdvice": "Please consult with a healthcare professional for personalized advice."
    });
    into_map(value)
}

pub fn fallback_meal_plan(raw_response: &str) -> Map<String, Value> {
    let value = json!({
        "overview": "Personalized meal plan based on your metrics",
        "nutritionalGuidelines": "Balanced diet appropriate for your BMI and age",
        "weeklyPlan": [
            {
                "day": "Sample Day",
                "meals": {
                    "breakfast": { "description": "Healthy breakfast options", "calories": "~300-400 kcal" },
                    "lunch": { "description": "Balanced lunch options", "calories": "~500-600 kcal" },
                    "dinner": { "description": "Nutritious dinner options", "calories": "~500-600 kcal" },
                    "snacks": { "description": "Healthy snack options", "calories": "~200-300 kcal" }
                }
            }
        ],
        "tips": [
            "Focus on whole foods",
            "Stay hydrated throughout the day",
            "Balance your macronutrients"
        ],
        "rawResponse": raw_response
    });
    into_map(value)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
