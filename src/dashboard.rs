//! Dashboard composition: a day's log plus computed targets.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tracing::instrument;

use crate::error::AppError;
use crate::meals::dto::MealResponse;
use crate::meals::repo::{self, DayTotals, MealRecord};
use crate::state::AppState;
use crate::targets::{compute_targets, DailyTargets, UserProfile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/targets", post(post_targets))
        .route("/dashboard", post(post_dashboard))
}

#[derive(Debug, Deserialize)]
pub struct DashboardRequest {
    pub profile: UserProfile,
    #[serde(with = "crate::meals::dto::iso_date::option", default)]
    pub date: Option<Date>,
}

/// Percent of the daily target consumed, per calorie/macro. `None` when the
/// corresponding target is zero. Values are clamped to 100 for display; the
/// underlying totals stay unclamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroPercents {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    #[serde(with = "crate::meals::dto::iso_date")]
    pub date: Date,
    pub targets: DailyTargets,
    pub consumed: DayTotals,
    pub percent_of_target: MacroPercents,
    pub meals: Vec<MealResponse>,
}

/// Pure composition of already-computed pieces; the only arithmetic here is
/// the guarded division.
pub fn compose(
    date: Date,
    targets: DailyTargets,
    consumed: DayTotals,
    meals: Vec<MealRecord>,
) -> DashboardView {
    let percent_of_target = MacroPercents {
        calories: percent(consumed.total_calories, targets.calorie_target),
        protein: percent(consumed.total_protein_g, targets.protein_target_g),
        carbs: percent(consumed.total_carbs_g, targets.carb_target_g),
        fat: percent(consumed.total_fat_g, targets.fat_target_g),
    };
    DashboardView {
        date,
        targets,
        consumed,
        percent_of_target,
        meals: meals.into_iter().map(MealResponse::from).collect(),
    }
}

fn percent(consumed: f64, target: f64) -> Option<f64> {
    if target > 0.0 {
        Some((consumed / target * 100.0).min(100.0))
    } else {
        None
    }
}

#[instrument(skip(profile))]
pub async fn post_targets(Json(profile): Json<UserProfile>) -> Result<Json<DailyTargets>, AppError> {
    Ok(Json(compute_targets(&profile)?))
}

#[instrument(skip(state, req))]
pub async fn post_dashboard(
    State(state): State<AppState>,
    Json(req): Json<DashboardRequest>,
) -> Result<Json<DashboardView>, AppError> {
    let date = req.date.unwrap_or_else(|| OffsetDateTime::now_utc().date());
    let targets = compute_targets(&req.profile)?;
    let meals = repo::list_by_date(&state.db, date).await?;
    let consumed = repo::aggregate_by_date(&state.db, date).await?;
    Ok(Json(compose(date, targets, consumed, meals)))
}
