use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::meals::dto::UpdateMealRequest;

/// One logged meal. Belongs to exactly one `log_date`; immutable once
/// stored except for user-initiated edit and delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub id: Uuid,
    pub log_date: Date,
    pub ts: Time,
    pub meal_name: String,
    pub serving: Option<String>,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub photo_key: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Field-wise sums over one calendar date. All-zero when the date has no
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, FromRow)]
pub struct DayTotals {
    pub total_calories: f64,
    pub total_protein_g: f64,
    pub total_carbs_g: f64,
    pub total_fat_g: f64,
    pub total_fiber_g: f64,
    pub total_sugar_g: f64,
}

const RECORD_COLUMNS: &str = "id, log_date, ts, meal_name, serving, calories, protein_g, \
                              carbs_g, fat_g, fiber_g, sugar_g, photo_key, created_at";

pub async fn insert(db: &SqlitePool, record: &MealRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meals
            (id, log_date, ts, meal_name, serving, calories, protein_g,
             carbs_g, fat_g, fiber_g, sugar_g, photo_key, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id)
    .bind(record.log_date)
    .bind(record.ts)
    .bind(&record.meal_name)
    .bind(&record.serving)
    .bind(record.calories)
    .bind(record.protein_g)
    .bind(record.carbs_g)
    .bind(record.fat_g)
    .bind(record.fiber_g)
    .bind(record.sugar_g)
    .bind(&record.photo_key)
    .bind(record.created_at)
    .execute(db)
    .await?;
    Ok(())
}

/// All records for one date, time ascending. Stateless; callers may
/// re-invoke freely.
pub async fn list_by_date(db: &SqlitePool, date: Date) -> Result<Vec<MealRecord>> {
    let rows = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        SELECT {}
        FROM meals
        WHERE log_date = ?
        ORDER BY ts ASC, id ASC
        "#,
        RECORD_COLUMNS
    ))
    .bind(date)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &SqlitePool, id: Uuid) -> Result<Option<MealRecord>> {
    let row = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        SELECT {}
        FROM meals
        WHERE id = ?
        "#,
        RECORD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Partial edit of a stored record. Absent fields keep their value;
/// supplied numbers must be non-negative and finite.
pub async fn update(db: &SqlitePool, id: Uuid, patch: &UpdateMealRequest) -> Result<MealRecord> {
    patch.validate()?;

    let row = sqlx::query_as::<_, MealRecord>(&format!(
        r#"
        UPDATE meals SET
            meal_name = COALESCE(?, meal_name),
            serving   = COALESCE(?, serving),
            calories  = COALESCE(?, calories),
            protein_g = COALESCE(?, protein_g),
            carbs_g   = COALESCE(?, carbs_g),
            fat_g     = COALESCE(?, fat_g),
            fiber_g   = COALESCE(?, fiber_g),
            sugar_g   = COALESCE(?, sugar_g)
        WHERE id = ?
        RETURNING {}
        "#,
        RECORD_COLUMNS
    ))
    .bind(&patch.meal_name)
    .bind(&patch.serving)
    .bind(patch.calories)
    .bind(patch.protein_g)
    .bind(patch.carbs_g)
    .bind(patch.fat_g)
    .bind(patch.fiber_g)
    .bind(patch.sugar_g)
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.ok_or(AppError::NotFound(id))
}

/// Deletion of a missing id fails with `NotFound`; a second delete of the
/// same id therefore also fails, never silently succeeding.
pub async fn delete(db: &SqlitePool, id: Uuid) -> Result<()> {
    let res = sqlx::query("DELETE FROM meals WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(id));
    }
    Ok(())
}

pub async fn aggregate_by_date(db: &SqlitePool, date: Date) -> Result<DayTotals> {
    let totals = sqlx::query_as::<_, DayTotals>(
        r#"
        SELECT
            COALESCE(SUM(calories),  0.0) AS total_calories,
            COALESCE(SUM(protein_g), 0.0) AS total_protein_g,
            COALESCE(SUM(carbs_g),   0.0) AS total_carbs_g,
            COALESCE(SUM(fat_g),     0.0) AS total_fat_g,
            COALESCE(SUM(fiber_g),   0.0) AS total_fiber_g,
            COALESCE(SUM(sugar_g),   0.0) AS total_sugar_g
        FROM meals
        WHERE log_date = ?
        "#,
    )
    .bind(date)
    .fetch_one(db)
    .await?;
    Ok(totals)
}


#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_append_then_list_round_trip() {
        let db = test_pool().await;
        let record = breakfast();
        insert(&db, &record).await.unwrap();

        let listed = list_by_date(&db, record.log_date).await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_time_ascending() {
        let db = test_pool().await;
        let day = date!(2025 - 08 - 20);
        let dinner = sample_record(day, time!(19:05), "Salmon and Rice");
        let early = sample_record(day, time!(07:00), "Espresso");

        insert(&db, &lunch()).await.unwrap();
        insert(&db, &dinner).await.unwrap();
        insert(&db, &early).await.unwrap();

        let names: Vec<_> = list_by_date(&db, day)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.meal_name)
            .collect();
        assert_eq!(
            names,
            vec!["Espresso", "Chicken Caesar Salad", "Salmon and Rice"]
        );
    }

    #[tokio::test]
    async fn test_records_group_strictly_by_date() {
        let db = test_pool().await;
        insert(&db, &breakfast()).await.unwrap();
        let other_day = sample_record(date!(2025 - 08 - 21), time!(08:15), "Toast");
        insert(&db, &other_day).await.unwrap();

        assert_eq!(list_by_date(&db, date!(2025 - 08 - 20)).await.unwrap().len(), 1);
        assert_eq!(list_by_date(&db, date!(2025 - 08 - 21)).await.unwrap().len(), 1);
        assert!(list_by_date(&db, date!(2025 - 08 - 22)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice_fails_second_time() {
        let db = test_pool().await;
        let record = breakfast();
        insert(&db, &record).await.unwrap();

        delete(&db, record.id).await.unwrap();
        let err = delete(&db, record.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(id) if id == record.id));
    }

    #[tokio::test]
    async fn test_aggregate_empty_date_is_all_zero() {
        let db = test_pool().await;
        let totals = aggregate_by_date(&db, date!(2025 - 01 - 01)).await.unwrap();
        assert_eq!(totals, DayTotals::default());
    }

    #[tokio::test]
    async fn test_aggregate_equals_field_wise_sum() {
        let db = test_pool().await;
        let day = date!(2025 - 08 - 20);
        let a = breakfast();
        let mut b = lunch();
        b.calories = 612.5;
        b.fiber_g = 3.25;
        let doomed = sample_record(day, time!(16:00), "Candy Bar");

        insert(&db, &a).await.unwrap();
        insert(&db, &b).await.unwrap();
        insert(&db, &doomed).await.unwrap();
        delete(&db, doomed.id).await.unwrap();

        let listed = list_by_date(&db, day).await.unwrap();
        let totals = aggregate_by_date(&db, day).await.unwrap();
        assert_eq!(
            totals.total_calories,
            listed.iter().map(|r| r.calories).sum::<f64>()
        );
        assert_eq!(
            totals.total_protein_g,
            listed.iter().map(|r| r.protein_g).sum::<f64>()
        );
        assert_eq!(
            totals.total_fiber_g,
            listed.iter().map(|r| r.fiber_g).sum::<f64>()
        );
        assert_eq!(
            totals.total_sugar_g,
            listed.iter().map(|r| r.sugar_g).sum::<f64>()
        );
    }

    #[tokio::test]
    async fn test_update_patches_only_supplied_fields() {
        let db = test_pool().await;
        let record = breakfast();
        insert(&db, &record).await.unwrap();

        let patch = UpdateMealRequest {
            meal_name: Some("Oatmeal, large bowl".into()),
            calories: Some(510.0),
            ..Default::default()
        };
        let updated = update(&db, record.id, &patch).await.unwrap();
        assert_eq!(updated.meal_name, "Oatmeal, large bowl");
        assert_eq!(updated.calories, 510.0);
        assert_eq!(updated.protein_g, record.protein_g);
        assert_eq!(updated.ts, record.ts);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let db = test_pool().await;
        let id = Uuid::new_v4();
        let err = update(&db, id, &UpdateMealRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(got) if got == id));
    }

    #[tokio::test]
    async fn test_update_rejects_negative_numbers() {
        let db = test_pool().await;
        let record = breakfast();
        insert(&db, &record).await.unwrap();

        let patch = UpdateMealRequest {
            calories: Some(-10.0),
            ..Default::default()
        };
        let err = update(&db, record.id, &patch).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
