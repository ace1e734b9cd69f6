//! Talad HTTP REST API
//!
//! Axum-based HTTP server for the admin panel. Each endpoint has a thin axum
//! handler that delegates to a pure inner function; the inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                   — health check with DB + articles dir status
//! - GET  /version                  — server version info
//! - GET  /articles                 — article listing from the index
//! - GET  /articles/{date}          — one day's parsed session record
//! - POST /articles/{date}/sessions — submit a session slot update

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use talad_core::ai::NarrativeBackend;
use talad_core::config::HttpConfig;
use talad_core::{ArticleStore, TaladError};

use crate::subsystems::notify::Notifier;
use crate::subsystems::publish::{self, SessionUpdateRequest};

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pool: PgPool,
    pub store: Arc<ArticleStore>,
    pub narrator: Arc<dyn NarrativeBackend>,
    pub notifier: Arc<Notifier>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/articles", get(list_articles_handler))
        .route("/articles/:date", get(article_handler))
        .route("/articles/:date/sessions", post(publish_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Talad HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub limit: Option<i64>,
}

const DEFAULT_LIST_LIMIT: i64 = 30;

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — probes the DB and the articles directory.
pub async fn health_inner(pool: &PgPool, store: &ArticleStore) -> (StatusCode, serde_json::Value) {
    let pg_ver = match talad_core::db::health_check(pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    let articles_dir = match tokio::fs::metadata(store.dir()).await {
        Ok(meta) if meta.is_dir() => "ok".to_string(),
        Ok(_) => "not a directory".to_string(),
        // Created on first write, so a missing directory is not unhealthy.
        Err(e) => format!("unavailable: {}", e),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "articles_dir": articles_dir,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "talad/1",
    })
}

/// Inner listing — reads the article index.
pub async fn list_articles_inner(
    pool: &PgPool,
    params: ListParams,
) -> (StatusCode, serde_json::Value) {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 365);
    match talad_core::db::list_articles(pool, limit).await {
        Ok(articles) => {
            let count = articles.len();
            (
                StatusCode::OK,
                serde_json::json!({
                    "articles": articles,
                    "count": count,
                }),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "error": e.to_string(),
                "status": "error",
            }),
        ),
    }
}

/// Inner article fetch — parses the day's document (empty record when the
/// day has no article yet).
pub async fn article_inner(store: &ArticleStore, date: &str) -> (StatusCode, serde_json::Value) {
    let date = match parse_date(date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match store.load(date).await {
        Ok(record) => match serde_json::to_value(&record) {
            Ok(value) => (StatusCode::OK, value),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": e.to_string(), "status": "error"}),
            ),
        },
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({"error": e.to_string(), "status": "error"}),
        ),
    }
}

/// Inner publish — validates and runs the full publish flow.
pub async fn publish_inner(
    state: &HttpState,
    date: &str,
    request: SessionUpdateRequest,
) -> (StatusCode, serde_json::Value) {
    let date = match parse_date(date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let start = Instant::now();

    let outcome = publish::publish_session(
        &state.pool,
        &state.store,
        state.narrator.as_ref(),
        &state.notifier,
        date,
        request,
    )
    .await;

    match outcome {
        Ok(outcome) => (
            StatusCode::OK,
            serde_json::json!({
                "published": true,
                "date": date,
                "slot": outcome.slot.as_str(),
                "narrative_source": outcome.narrative_source.as_str(),
                "slots_filled": outcome.record.slots_filled(),
                "took_ms": start.elapsed().as_millis() as u64,
            }),
        ),
        Err(TaladError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": message,
                "status": "error",
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "error": e.to_string(),
                "status": "error",
            }),
        ),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, (StatusCode, serde_json::Value)> {
    raw.parse::<NaiveDate>().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": format!("invalid date: {} (expected YYYY-MM-DD)", raw),
                "status": "error",
            }),
        )
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool, &state.store).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn list_articles_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let (status, body) = list_articles_inner(&state.pool, params).await;
    (status, Json(body))
}

pub async fn article_handler(
    State(state): State<Arc<HttpState>>,
    Path(date): Path<String>,
) -> impl IntoResponse {
    let (status, body) = article_inner(&state.store, &date).await;
    (status, Json(body))
}

pub async fn publish_handler(
    State(state): State<Arc<HttpState>>,
    Path(date): Path<String>,
    Json(request): Json<SessionUpdateRequest>,
) -> impl IntoResponse {
    let (status, body) = publish_inner(&state, &date, request).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "talad/1", "protocol must be talad/1");
    }

    #[test]
    fn test_parse_date_accepts_iso_dates() {
        assert!(parse_date("2024-03-11").is_ok());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        let (status, body) = parse_date("yesterday").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = parse_date("2024-13-40").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
