use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use bytes::Bytes;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{CreateMealBase64, DayQuery, DaySummary, MealResponse, UpdateMealRequest};
use super::{repo, services};
use crate::error::AppError;
use crate::state::AppState;

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/summary", get(day_summary))
        .route("/meals/:id/photo", get(get_photo))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal_multipart))
        .route("/meals/base64", post(create_meal_base64))
        .route("/meals/:id", put(update_meal).delete(delete_meal))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<MealResponse>>, AppError> {
    let date = q.date.unwrap_or_else(today);
    let meals = repo::list_by_date(&state.db, date).await?;
    Ok(Json(meals.into_iter().map(MealResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn day_summary(
    State(state): State<AppState>,
    Query(q): Query<DayQuery>,
) -> Result<Json<DaySummary>, AppError> {
    let date = q.date.unwrap_or_else(today);
    let totals = repo::aggregate_by_date(&state.db, date).await?;
    Ok(Json(DaySummary { date, totals }))
}

/// POST /meals (multipart): `photo` file field, optional `name` and `date`
/// text fields.
#[instrument(skip(state, mp))]
pub async fn create_meal_multipart(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<MealResponse>), AppError> {
    let mut photo: Option<(Bytes, String)> = None;
    let mut name: Option<String> = None;
    let mut date: Option<Date> = None;

    while let Ok(Some(field)) = mp.next_field().await {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("photo") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "image/jpeg".into());
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("failed to read photo field: {}", e))
                })?;
                photo = Some((data, content_type));
            }
            Some("name") => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("failed to read name field: {}", e))
                })?;
                if !text.trim().is_empty() {
                    name = Some(text);
                }
            }
            Some("date") => {
                let text = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("failed to read date field: {}", e))
                })?;
                date = Some(parse_date(&text)?);
            }
            _ => {}
        }
    }

    let (body, content_type) =
        photo.ok_or_else(|| AppError::InvalidInput("photo field is required".into()))?;
    let record =
        services::analyze_and_log(&state, body, &content_type, name.as_deref(), date).await?;
    created_response(record)
}

/// POST /meals/base64: JSON body for clients that cannot send multipart.
#[instrument(skip(state, body))]
pub async fn create_meal_base64(
    State(state): State<AppState>,
    Json(body): Json<CreateMealBase64>,
) -> Result<(StatusCode, HeaderMap, Json<MealResponse>), AppError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&body.image_b64)
        .map_err(|_| AppError::InvalidInput("image_b64 is not valid base64".into()))?;
    let content_type = body.content_type.as_deref().unwrap_or("image/jpeg");

    let record = services::analyze_and_log(
        &state,
        Bytes::from(bytes),
        content_type,
        body.name.as_deref(),
        body.date,
    )
    .await?;
    created_response(record)
}

#[instrument(skip(state, patch))]
pub async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateMealRequest>,
) -> Result<Json<MealResponse>, AppError> {
    let updated = repo::update(&state.db, id, &patch).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_meal(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a short-lived presigned URL for the meal's photo.
#[instrument(skip(state))]
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let record = repo::get(&state.db, id)
        .await?
        .ok_or(AppError::NotFound(id))?;
    let key = record.photo_key.ok_or(AppError::NotFound(id))?;

    let url = state.photos.photo_url(&key, 600).await.map_err(|e| {
        error!(error = %e, meal_id = %id, "presign failed");
        AppError::Persistence(format!("presign photo url: {}", e))
    })?;
    Ok(Redirect::temporary(&url))
}

fn parse_date(text: &str) -> Result<Date, AppError> {
    Date::parse(text.trim(), DATE_FORMAT)
        .map_err(|_| AppError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", text)))
}

fn created_response(
    record: repo::MealRecord,
) -> Result<(StatusCode, HeaderMap, Json<MealResponse>), AppError> {
    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/meals/{}", record.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(record.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-08-20").unwrap(), date!(2025 - 08 - 20));
        assert_eq!(parse_date(" 2025-08-20 ").unwrap(), date!(2025 - 08 - 20));
        assert!(parse_date("20/08/2025").is_err());
        assert!(parse_date("yesterday").is_err());
    }
}
