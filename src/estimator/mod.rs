//! Vision-model meal estimation: trait boundary, prompt, response parsing.

pub mod openai;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use openai::OpenAiVisionEstimator;

/// External vision-model boundary. Production uses an OpenAI-compatible
/// endpoint; tests inject fakes with fixed (possibly malformed) responses.
#[async_trait]
pub trait MealEstimator: Send + Sync {
    async fn estimate(
        &self,
        image: &[u8],
        content_type: &str,
        name_hint: Option<&str>,
    ) -> Result<MealEstimate>;
}

/// Validated output of one estimation call. Not yet persisted; the caller
/// assigns id and timestamps when it logs the meal.
#[derive(Debug, Clone, PartialEq)]
pub struct MealEstimate {
    pub meal_name: String,
    pub serving: Option<String>,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
}

/// Instruction sent alongside the photo. With a hint the model is asked to
/// confirm or correct the user's description; the model's name wins either
/// way.
pub fn build_prompt(name_hint: Option<&str>) -> String {
    match name_hint {
        Some(hint) => format!(
            "You are a nutritionist. The user says the meal is '{}'. \
             Confirm or correct that description, then estimate nutrition. \
             Respond ONLY as JSON with keys: meal_name (a short human-readable \
             name), calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, serving.",
            hint
        ),
        None => "Identify this meal and estimate its nutrition. \
                 Respond ONLY as JSON with keys: meal_name, calories, protein_g, \
                 carbs_g, fat_g, fiber_g, sugar_g, serving."
            .to_string(),
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawEstimate {
    meal_name: Option<String>,
    serving: Option<String>,
    calories: Option<f64>,
    protein_g: Option<f64>,
    carbs_g: Option<f64>,
    fat_g: Option<f64>,
    fiber_g: Option<f64>,
    sugar_g: Option<f64>,
}

/// Parse the model's textual answer into a validated [`MealEstimate`].
///
/// Calories and the three macros are required; fiber and sugar default to
/// zero when absent. All numbers must be finite and non-negative. The
/// model's `meal_name` takes precedence over the user's hint.
pub fn parse_estimate(raw: &str, name_hint: Option<&str>) -> Result<MealEstimate> {
    let body = strip_code_fences(raw);
    let parsed: RawEstimate = serde_json::from_str(body)
        .map_err(|e| AppError::EstimationParse(format!("response is not valid JSON: {}", e)))?;

    let meal_name = parsed
        .meal_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| name_hint.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .ok_or_else(|| AppError::EstimationParse("response contains no dish name".into()))?;

    Ok(MealEstimate {
        meal_name,
        serving: parsed.serving.filter(|s| !s.trim().is_empty()),
        calories: required_number("calories", parsed.calories)?,
        protein_g: required_number("protein_g", parsed.protein_g)?,
        carbs_g: required_number("carbs_g", parsed.carbs_g)?,
        fat_g: required_number("fat_g", parsed.fat_g)?,
        fiber_g: optional_number("fiber_g", parsed.fiber_g)?,
        sugar_g: optional_number("sugar_g", parsed.sugar_g)?,
    })
}

fn required_number(field: &str, value: Option<f64>) -> Result<f64> {
    let v = value.ok_or_else(|| {
        AppError::EstimationParse(format!("missing numeric field `{}`", field))
    })?;
    validate_number(field, v)
}

fn optional_number(field: &str, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) => validate_number(field, v),
        None => Ok(0.0),
    }
}

fn validate_number(field: &str, v: f64) -> Result<f64> {
    if !v.is_finite() || v < 0.0 {
        return Err(AppError::EstimationParse(format!(
            "field `{}` must be a non-negative finite number, got {}",
            field, v
        )));
    }
    Ok(v)
}

/// Models occasionally wrap the JSON object in Markdown fences even when
/// told not to; tolerate that.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = r#"{
        "meal_name": "Margherita Pizza",
        "serving": "2 slices",
        "calories": 540,
        "protein_g": 22.5,
        "carbs_g": 62,
        "fat_g": 21,
        "fiber_g": 4,
        "sugar_g": 7
    }"#;

    #[test]
    fn test_parse_full_response() {
        let est = parse_estimate(FULL_RESPONSE, None).unwrap();
        assert_eq!(est.meal_name, "Margherita Pizza");
        assert_eq!(est.serving.as_deref(), Some("2 slices"));
        assert_eq!(est.calories, 540.0);
        assert_eq!(est.protein_g, 22.5);
        assert_eq!(est.fiber_g, 4.0);
    }

    #[test]
    fn test_corrected_name_wins_over_hint() {
        let est = parse_estimate(FULL_RESPONSE, Some("cheese toast")).unwrap();
        assert_eq!(est.meal_name, "Margherita Pizza");
    }

    #[test]
    fn test_hint_is_fallback_when_name_missing() {
        let raw = r#"{"calories": 200, "protein_g": 10, "carbs_g": 20, "fat_g": 8}"#;
        let est = parse_estimate(raw, Some("oatmeal")).unwrap();
        assert_eq!(est.meal_name, "oatmeal");
        assert_eq!(est.fiber_g, 0.0);
        assert_eq!(est.sugar_g, 0.0);
    }

    #[test]
    fn test_no_name_anywhere_is_parse_error() {
        let raw = r#"{"calories": 200, "protein_g": 10, "carbs_g": 20, "fat_g": 8}"#;
        let err = parse_estimate(raw, None).unwrap_err();
        assert!(matches!(err, AppError::EstimationParse(_)));
    }

    #[test]
    fn test_missing_required_number() {
        let raw = r#"{"meal_name": "Soup", "protein_g": 10, "carbs_g": 20, "fat_g": 8}"#;
        let err = parse_estimate(raw, None).unwrap_err();
        match err {
            AppError::EstimationParse(msg) => assert!(msg.contains("calories")),
            other => panic!("expected EstimationParse, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_field_is_parse_error() {
        let raw = r#"{"meal_name": "Soup", "calories": "350 kcal",
                      "protein_g": 10, "carbs_g": 20, "fat_g": 8}"#;
        assert!(matches!(
            parse_estimate(raw, None).unwrap_err(),
            AppError::EstimationParse(_)
        ));
    }

    #[test]
    fn test_negative_number_rejected() {
        let raw = r#"{"meal_name": "Soup", "calories": -1,
                      "protein_g": 10, "carbs_g": 20, "fat_g": 8}"#;
        assert!(matches!(
            parse_estimate(raw, None).unwrap_err(),
            AppError::EstimationParse(_)
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            parse_estimate("I cannot see any food here.", None).unwrap_err(),
            AppError::EstimationParse(_)
        ));
    }

    #[test]
    fn test_tolerates_code_fences() {
        let fenced = format!("```json\n{}\n```", FULL_RESPONSE);
        let est = parse_estimate(&fenced, None).unwrap();
        assert_eq!(est.meal_name, "Margherita Pizza");
    }

    #[test]
    fn test_prompt_includes_hint() {
        let p = build_prompt(Some("chicken wrap"));
        assert!(p.contains("'chicken wrap'"));
        assert!(p.contains("Confirm or correct"));

        let p = build_prompt(None);
        assert!(p.contains("Identify this meal"));
    }
}
