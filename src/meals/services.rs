use bytes::Bytes;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::repo;
use crate::error::{AppError, Result};
use crate::meals::repo::MealRecord;
use crate::state::AppState;

/// Full add-meal pipeline: estimate nutrition from the photo, store the
/// photo, append the record. The photo object is removed again if the row
/// insert fails, so no partial write stays visible.
pub async fn analyze_and_log(
    st: &AppState,
    photo: Bytes,
    content_type: &str,
    name_hint: Option<&str>,
    date_override: Option<Date>,
) -> Result<MealRecord> {
    if photo.is_empty() {
        return Err(AppError::InvalidInput("photo must not be empty".into()));
    }
    let hint = name_hint.map(str::trim).filter(|s| !s.is_empty());

    let estimate = st.estimator.estimate(&photo, content_type, hint).await?;

    let now = OffsetDateTime::now_utc();
    let id = Uuid::new_v4();
    let log_date = date_override.unwrap_or_else(|| now.date());
    let ext = ext_from_mime(content_type).unwrap_or("jpg");
    let photo_key = format!("photos/{}/{}.{}", log_date, id, ext);

    st.photos
        .put_photo(&photo_key, photo, content_type)
        .await
        .map_err(|e| AppError::Persistence(format!("store photo {}: {}", photo_key, e)))?;

    let record = MealRecord {
        id,
        log_date,
        ts: now.time(),
        meal_name: estimate.meal_name,
        serving: estimate.serving,
        calories: estimate.calories,
        protein_g: estimate.protein_g,
        carbs_g: estimate.carbs_g,
        fat_g: estimate.fat_g,
        fiber_g: estimate.fiber_g,
        sugar_g: estimate.sugar_g,
        photo_key: Some(photo_key.clone()),
        created_at: now,
    };

    if let Err(e) = repo::insert(&st.db, &record).await {
        if let Err(del) = st.photos.delete_photo(&photo_key).await {
            warn!(error = %del, key = %photo_key, "orphan photo cleanup failed");
        }
        return Err(e);
    }

    info!(meal_id = %id, date = %log_date, name = %record.meal_name, "meal logged");
    Ok(record)
}

/// Delete the row first, then the photo object best-effort; a stale photo
/// is harmless, a stale row is not.
pub async fn delete_meal(st: &AppState, id: Uuid) -> Result<()> {
    let record = repo::get(&st.db, id).await?.ok_or(AppError::NotFound(id))?;
    repo::delete(&st.db, id).await?;

    if let Some(key) = record.photo_key {
        if let Err(e) = st.photos.delete_photo(&key).await {
            warn!(error = %e, meal_id = %id, key = %key, "photo cleanup failed");
        }
    }
    info!(meal_id = %id, "meal deleted");
    Ok(())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
