//! User persistence. Written after the digest has gone out, in the background.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::models::user::UserRecord;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn save(&self, record: &UserRecord) -> Result<(), sqlx::Error>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Upserts by `user_id`. `created_at` is kept from the first insert.
    async fn save(&self, record: &UserRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, email, user_interests, selected_sections,
                 curated_articles, article_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                user_interests = EXCLUDED.user_interests,
                selected_sections = EXCLUDED.selected_sections,
                curated_articles = EXCLUDED.curated_articles,
                article_count = EXCLUDED.article_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id)
        .bind(&record.email)
        .bind(&record.user_interests)
        .bind(&record.selected_sections)
        .bind(&record.curated_articles)
        .bind(record.article_count)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Handle to a background save. Dropping it detaches the task; the result is
/// only ever logged.
pub struct PersistTask {
    handle: JoinHandle<bool>,
}

impl PersistTask {
    /// Spawns `store.save(record)` on the runtime and returns immediately.
    pub fn spawn(store: Arc<dyn UserStore>, record: UserRecord) -> Self {
        let handle = tokio::spawn(async move {
            match store.save(&record).await {
                Ok(()) => {
                    info!("Saved user {} ({} articles)", record.user_id, record.article_count);
                    true
                }
                Err(e) => {
                    error!("Failed to save user {}: {e}", record.user_id);
                    false
                }
            }
        });
        Self { handle }
    }

    /// Waits for the save. `false` if it failed or the task panicked.
    pub async fn wait(self) -> bool {
        match self.handle.await {
            Ok(saved) => saved,
            Err(e) => {
                error!("Persistence task did not complete: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use crate::test_support::MemoryUserStore;

    fn record() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            user_id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            user_interests: "semiconductors and football".to_string(),
            selected_sections: "technology|football".to_string(),
            curated_articles: json!([]),
            article_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_persist_task_saves_record() {
        let store = Arc::new(MemoryUserStore::default());
        let rec = record();

        let saved = PersistTask::spawn(store.clone(), rec.clone()).wait().await;

        assert!(saved);
        assert_eq!(store.saved.lock().unwrap()[0].user_id, rec.user_id);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_not_raised() {
        let store = Arc::new(MemoryUserStore {
            failing: true,
            ..MemoryUserStore::default()
        });

        let saved = PersistTask::spawn(store.clone(), record()).wait().await;

        assert!(!saved);
        assert!(store.saved.lock().unwrap().is_empty());
    }
}
