use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::meals::repo::MealRecord;

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Serialize)]
pub struct MealResponse {
    pub id: Uuid,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time: Time,
    pub name: String,
    pub serving: Option<String>,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub photo_reference: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<MealRecord> for MealResponse {
    fn from(r: MealRecord) -> Self {
        Self {
            id: r.id,
            date: r.log_date,
            time: r.ts,
            name: r.meal_name,
            serving: r.serving,
            calories: r.calories,
            protein_g: r.protein_g,
            carbs_g: r.carbs_g,
            fat_g: r.fat_g,
            fiber_g: r.fiber_g,
            sugar_g: r.sugar_g,
            photo_reference: r.photo_key,
            created_at: r.created_at,
        }
    }
}

/// JSON alternative to the multipart upload.
#[derive(Debug, Deserialize)]
pub struct CreateMealBase64 {
    pub image_b64: String,
    pub content_type: Option<String>,
    pub name: Option<String>,
    #[serde(with = "iso_date::option", default)]
    pub date: Option<Date>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealRequest {
    pub meal_name: Option<String>,
    pub serving: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
}

impl UpdateMealRequest {
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
            ("fiber_g", self.fiber_g),
            ("sugar_g", self.sugar_g),
        ];
        for (field, value) in numbers {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AppError::InvalidInput(format!(
                        "{} must be a non-negative finite number, got {}",
                        field, v
                    )));
                }
            }
        }
        if let Some(name) = &self.meal_name {
            if name.trim().is_empty() {
                return Err(AppError::InvalidInput("meal_name must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    #[serde(with = "iso_date::option", default)]
    pub date: Option<Date>,
}

#[derive(Debug, Serialize)]
pub struct DaySummary {
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(flatten)]
    pub totals: crate::meals::repo::DayTotals,
}
