use crate::geo::round_one_decimal;

/// BMI from weight in kg and height in cm, one decimal place.
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    round_one_decimal(weight_kg / (height_m * height_m))
}

pub fn classify_bmi(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        "Underweight"
    } else if bmi < 25.0 {
        "Normal"
    } else if bmi < 30.0 {
        "Overweight"
    } else {
        "Obese"
    }
}

/// Decade bucket, e.g. 34 → `"30-39"`.
pub fn age_group(age: u32) -> String {
    let decade = age / 10 * 10;
    format!("{}-{}", decade, decade + 9)
}
