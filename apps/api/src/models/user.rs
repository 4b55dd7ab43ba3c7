use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// The durable per-user state written after each digest run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    pub user_interests: String,
    /// Pipe-delimited section ids, as produced by the section selector.
    pub selected_sections: String,
    /// The curated articles exactly as sent, stored as a JSON array.
    pub curated_articles: Value,
    pub article_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
