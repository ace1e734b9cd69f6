//! Article index — listing-only metadata in Postgres.
//!
//! Schema (one row per trading day):
//!
//! ```sql
//! CREATE TABLE articles (
//!     id            UUID PRIMARY KEY,
//!     article_date  DATE NOT NULL UNIQUE,
//!     title         TEXT NOT NULL,
//!     slots_filled  SMALLINT NOT NULL DEFAULT 0,
//!     updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! The markdown file is the source of truth; this table only powers the
//! article listing and is upserted on every publish.

use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::ArticleMeta;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Insert or refresh the index row for a date. Returns the row id.
pub async fn upsert_article_meta(
    pool: &PgPool,
    date: NaiveDate,
    title: &str,
    slots_filled: i16,
) -> Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO articles (id, article_date, title, slots_filled, updated_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (article_date)
         DO UPDATE SET title = EXCLUDED.title,
                       slots_filled = EXCLUDED.slots_filled,
                       updated_at = now()
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(date)
    .bind(title)
    .bind(slots_filled)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Most recent articles first.
pub async fn list_articles(pool: &PgPool, limit: i64) -> Result<Vec<ArticleMeta>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, article_date, title, slots_filled, updated_at
         FROM articles
         ORDER BY article_date DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_article_meta(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Option<ArticleMeta>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, article_date, title, slots_filled, updated_at
         FROM articles
         WHERE article_date = $1",
    )
    .bind(date)
    .fetch_optional(pool)
    .await
}
