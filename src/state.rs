use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::estimator::{MealEstimator, OpenAiVisionEstimator};
use crate::storage::{PhotoStorage, PhotoStore};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub estimator: Arc<dyn MealEstimator>,
    pub photos: Arc<dyn PhotoStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let photos = Arc::new(
            PhotoStorage::new(
                &config.minio_endpoint,
                &config.minio_bucket,
                &config.minio_access_key,
                &config.minio_secret_key,
                "us-east-1",
            )
            .await?,
        ) as Arc<dyn PhotoStore>;

        let estimator =
            Arc::new(OpenAiVisionEstimator::new(config.vision.clone())) as Arc<dyn MealEstimator>;

        Ok(Self {
            db,
            config,
            estimator,
            photos,
        })
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        estimator: Arc<dyn MealEstimator>,
        photos: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            db,
            config,
            estimator,
            photos,
        }
    }

    /// State with deterministic in-process collaborators, for tests.
    pub fn fake(db: SqlitePool) -> Self {
        use async_trait::async_trait;
        use bytes::Bytes;

        use crate::error::Result;
        use crate::estimator::MealEstimate;

        struct FakeEstimator;

        #[async_trait]
        impl MealEstimator for FakeEstimator {
            async fn estimate(
                &self,
                _image: &[u8],
                _content_type: &str,
                _name_hint: Option<&str>,
            ) -> Result<MealEstimate> {
                Ok(MealEstimate {
                    meal_name: "Grilled Chicken Salad".into(),
                    serving: Some("1 bowl".into()),
                    calories: 320.0,
                    protein_g: 28.0,
                    carbs_g: 12.0,
                    fat_g: 18.0,
                    fiber_g: 4.0,
                    sugar_g: 6.0,
                })
            }
        }

        struct FakePhotos;

        #[async_trait]
        impl PhotoStore for FakePhotos {
            async fn put_photo(
                &self,
                _key: &str,
                _body: Bytes,
                _content_type: &str,
            ) -> anyhow::Result<()> {
                Ok(())
            }
            async fn delete_photo(&self, _key: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn photo_url(&self, key: &str, _expires_secs: u64) -> anyhow::Result<String> {
                Ok(format!("https://fake.local/{}", key))
            }
        }

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            vision: crate::config::VisionConfig {
                base_url: "http://localhost:11434/v1".into(),
                api_key: None,
                model: "test".into(),
                timeout_secs: 5,
                max_tokens: 350,
            },
            minio_endpoint: "fake".into(),
            minio_bucket: "fake".into(),
            minio_access_key: "fake".into(),
            minio_secret_key: "fake".into(),
        });

        Self {
            db,
            config,
            estimator: Arc::new(FakeEstimator),
            photos: Arc::new(FakePhotos),
        }
    }
}
