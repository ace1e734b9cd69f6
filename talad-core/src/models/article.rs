use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing-only metadata row mirrored into Postgres on every publish.
/// The markdown file remains the source of truth for article content.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleMeta {
    pub id: Uuid,
    pub article_date: NaiveDate,
    pub title: String,
    pub slots_filled: i16,
    pub updated_at: DateTime<Utc>,
}
