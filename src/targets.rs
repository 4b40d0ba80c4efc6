use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Calorie target is never allowed below this, regardless of goal delta.
pub const CALORIE_FLOOR: f64 = 1200.0;

/// Kcal adjustment applied to TDEE per goal.
const LOSE_DELTA: f64 = -500.0;
const GAIN_DELTA: f64 = 500.0;

/// Macro split of the calorie target. Must sum to 1.0; stored history
/// implicitly depends on these, so they are fixed.
const PROTEIN_SPLIT: f64 = 0.25;
const CARB_SPLIT: f64 = 0.50;
const FAT_SPLIT: f64 = 0.25;

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARB: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// Fixed TDEE multipliers. These values are part of the product
    /// contract: historical targets were computed with them.
    pub const fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl Goal {
    pub const fn calorie_delta(self) -> f64 {
        match self {
            Goal::Lose => LOSE_DELTA,
            Goal::Maintain => 0.0,
            Goal::Gain => GAIN_DELTA,
        }
    }
}

/// User biometrics, supplied per request. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: f64,
    pub sex: Sex,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
}

/// Derived energy/macro targets. Pure function of the profile, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTargets {
    pub bmr: f64,
    pub tdee: f64,
    pub calorie_target: f64,
    pub protein_target_g: f64,
    pub carb_target_g: f64,
    pub fat_target_g: f64,
}

/// Mifflin-St Jeor BMR scaled by activity, adjusted by goal, floored at
/// [`CALORIE_FLOOR`], with a 25/50/25 protein/carb/fat split at 4/4/9 kcal
/// per gram. Deterministic and side-effect free.
pub fn compute_targets(profile: &UserProfile) -> Result<DailyTargets> {
    validate_positive("weight_kg", profile.weight_kg)?;
    validate_positive("height_cm", profile.height_cm)?;
    validate_positive("age_years", profile.age_years)?;

    let sex_offset = match profile.sex {
        Sex::Male => 5.0,
        Sex::Female => -161.0,
    };
    let bmr =
        10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * profile.age_years + sex_offset;
    let tdee = bmr * profile.activity_level.multiplier();
    let calorie_target = (tdee + profile.goal.calorie_delta()).max(CALORIE_FLOOR);

    Ok(DailyTargets {
        bmr,
        tdee,
        calorie_target,
        protein_target_g: calorie_target * PROTEIN_SPLIT / KCAL_PER_G_PROTEIN,
        carb_target_g: calorie_target * CARB_SPLIT / KCAL_PER_G_CARB,
        fat_target_g: calorie_target * FAT_SPLIT / KCAL_PER_G_FAT,
    })
}

fn validate_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidInput(format!(
            "{} must be a positive finite number, got {}",
            field, value
        )));
    }
    Ok(())
}
