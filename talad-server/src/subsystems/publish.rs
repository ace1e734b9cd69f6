//! Publish subsystem — one session update end to end.
//!
//! Order matters: validation happens before any file mutation so partial
//! writes never occur; the narrative is chosen before the merge so the
//! document is written once; the index upsert and the bot notification come
//! after the file write and never fail the request (the markdown file is the
//! source of truth, the rest is best-effort).

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

use talad_core::ai::{BackendConfig, NarrativeBackend, NarrativeError, NarrativeRequest};
use talad_core::config::TaladConfig;
use talad_core::models::{SessionRecord, SlotName, SlotUpdate};
use talad_core::narrative;
use talad_core::{create_backend, ArticleStore, NarrativeClientConfig, TaladError};

use crate::subsystems::notify::Notifier;

/// Slot update as submitted by the admin client.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUpdateRequest {
    pub slot: Option<String>,
    pub index: Option<f64>,
    pub change: Option<f64>,
    pub highlights: Option<String>,
    /// Pre-generated narrative (e.g. the admin panel already called the AI
    /// backend). When absent the server drafts one itself.
    pub narrative: Option<String>,
}

/// Where the published narrative text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeSource {
    Caller,
    Backend,
    Generated,
}

impl NarrativeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeSource::Caller => "caller",
            NarrativeSource::Backend => "backend",
            NarrativeSource::Generated => "generated",
        }
    }
}

#[derive(Debug)]
pub struct PublishOutcome {
    pub slot: SlotName,
    pub record: SessionRecord,
    pub narrative_source: NarrativeSource,
}

/// Check the request before anything touches disk.
pub fn validate(request: &SessionUpdateRequest) -> Result<(SlotName, f64, f64), TaladError> {
    let slot = request
        .slot
        .as_deref()
        .ok_or_else(|| TaladError::Validation("slot field is required".to_string()))?
        .parse::<SlotName>()
        .map_err(TaladError::Validation)?;
    let index = request
        .index
        .ok_or_else(|| TaladError::Validation("index field is required".to_string()))?;
    let change = request
        .change
        .ok_or_else(|| TaladError::Validation("change field is required".to_string()))?;
    Ok((slot, index, change))
}

/// Run one session publish: validate, pick the narrative, merge-write the
/// document, refresh the index row, forward the notification.
pub async fn publish_session(
    pool: &PgPool,
    store: &ArticleStore,
    narrator: &dyn NarrativeBackend,
    notifier: &Arc<Notifier>,
    date: NaiveDate,
    request: SessionUpdateRequest,
) -> Result<PublishOutcome, TaladError> {
    let (slot, index, change) = validate(&request)?;

    let (narrative_text, narrative_source) = match request.narrative {
        Some(text) => (text, NarrativeSource::Caller),
        None => {
            let narrative_request = NarrativeRequest {
                date,
                slot,
                index,
                change,
                highlights: request.highlights.clone(),
            };
            match narrator.narrate(&narrative_request).await {
                Ok(Some(text)) => (text, NarrativeSource::Backend),
                Ok(None) => (generated_narrative(&request), NarrativeSource::Generated),
                Err(e) => {
                    tracing::warn!(
                        date = %date,
                        slot = %slot,
                        backend = narrator.name(),
                        error = %e,
                        "Narrative backend failed, using generated text"
                    );
                    (generated_narrative(&request), NarrativeSource::Generated)
                }
            }
        }
    };

    let update = SlotUpdate {
        index,
        change,
        highlights: request.highlights,
        narrative: Some(narrative_text),
    };
    let record = store.update_slot(date, slot, &update).await?;

    let title = format!("SET Market Report: {}", date);
    if let Err(e) =
        talad_core::db::upsert_article_meta(pool, date, &title, record.slots_filled()).await
    {
        tracing::warn!(
            date = %date,
            error = %e,
            "Article index upsert failed; the article file itself is persisted"
        );
    }

    notifier.spawn_send(format!(
        "{} {}: SET {} ({:+})",
        date,
        slot.as_str().replace('_', " "),
        index,
        change
    ));

    Ok(PublishOutcome {
        slot,
        record,
        narrative_source,
    })
}

fn generated_narrative(request: &SessionUpdateRequest) -> String {
    narrative::highlight_narrative(request.highlights.as_deref().unwrap_or_default())
}

/// Create a narrative backend from the application config.
///
/// Reads `[narrative] backend` to select Gemini, Gemini-fallback, or the
/// disabled backend.
pub fn create_narrator_from_config(
    config: &TaladConfig,
) -> Result<Box<dyn NarrativeBackend>, NarrativeError> {
    let api_key = std::env::var("GOOGLE_API_KEY").unwrap_or_default();

    let client_config = NarrativeClientConfig {
        api_key,
        model: config.narrative.model.clone(),
        max_retries: config.narrative.max_retries,
        retry_delay_ms: config.narrative.retry_delay_ms,
    };

    let backend_config = match config.narrative.backend.as_str() {
        "gemini" => BackendConfig::Gemini(client_config),
        "gemini-fallback" => BackendConfig::GeminiFallback(client_config),
        _ => {
            // Default: "disabled"
            BackendConfig::Disabled
        }
    };

    create_backend(backend_config)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(slot: Option<&str>, index: Option<f64>, change: Option<f64>) -> SessionUpdateRequest {
        SessionUpdateRequest {
            slot: slot.map(|s| s.to_string()),
            index,
            change,
            highlights: None,
            narrative: None,
        }
    }

    #[test]
    fn validate_accepts_a_complete_request() {
        let (slot, index, change) =
            validate(&request(Some("morning_open"), Some(1302.75), Some(16.49))).unwrap();
        assert_eq!(slot, SlotName::MorningOpen);
        assert_eq!(index, 1302.75);
        assert_eq!(change, 16.49);
    }

    #[test]
    fn validate_rejects_missing_numeric_fields() {
        let err = validate(&request(Some("morning_open"), None, Some(1.0))).unwrap_err();
        assert!(matches!(err, TaladError::Validation(_)));

        let err = validate(&request(Some("morning_open"), Some(1.0), None)).unwrap_err();
        assert!(matches!(err, TaladError::Validation(_)));
    }

    #[test]
    fn validate_rejects_missing_or_unknown_slot() {
        let err = validate(&request(None, Some(1.0), Some(1.0))).unwrap_err();
        assert!(matches!(err, TaladError::Validation(_)));

        let err = validate(&request(Some("midday_open"), Some(1.0), Some(1.0))).unwrap_err();
        assert!(matches!(err, TaladError::Validation(_)));
    }

    #[test]
    fn generated_narrative_is_never_empty() {
        let mut req = request(Some("morning_close"), Some(1.0), Some(1.0));
        assert!(!generated_narrative(&req).is_empty());

        req.highlights = Some("+68 +61 +64".to_string());
        assert!(!generated_narrative(&req).is_empty());
    }
}
