//! AI narrative client — drafts session commentary text.
//!
//! Provides a `NarrativeBackend` trait with implementations for:
//! - **Gemini** — cloud text generation via the Gemini API
//! - **Gemini-fallback** — Gemini with graceful degradation to `Ok(None)`
//! - **Disabled** — always `Ok(None)` (the default when no API key is deployed)
//!
//! `Ok(None)` signals the caller to fall back to the phrase-table generator
//! in `crate::narrative`. The client only ever produces prose; the numeric
//! index and change fields always come from caller input.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::models::SlotName;

// ============================================================================
// NarrativeBackend trait
// ============================================================================

/// Context handed to the backend for one slot update.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub date: NaiveDate,
    pub slot: SlotName,
    pub index: f64,
    pub change: f64,
    pub highlights: Option<String>,
}

impl NarrativeRequest {
    /// Prompt sent to the text-generation API. Open slots ask for an
    /// analysis paragraph, close slots for a summary.
    fn prompt(&self) -> String {
        let style = if self.slot.is_open() {
            "a short opening analysis paragraph"
        } else {
            "a short closing summary paragraph"
        };
        let mut prompt = format!(
            "Write {} for the SET (Stock Exchange of Thailand) {} session on {}. \
             The index stands at {} ({:+} from the prior reference).",
            style,
            self.slot.as_str().replace('_', " "),
            self.date,
            self.index,
            self.change,
        );
        if let Some(highlights) = &self.highlights {
            prompt.push_str(&format!(" Sector highlights: {}.", highlights));
        }
        prompt.push_str(" Plain prose, no headings, at most three sentences.");
        prompt
    }
}

/// Abstraction over narrative providers.
#[async_trait]
pub trait NarrativeBackend: Send + Sync {
    /// Draft narrative text for a slot update. Returns `None` if no text is
    /// available (used in fallback/disabled modes to signal graceful
    /// degradation).
    async fn narrate(&self, request: &NarrativeRequest) -> Result<Option<String>, NarrativeError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Narrative generation errors
#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing candidate text in response")]
    MissingCandidate,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config types
// ============================================================================

/// Gemini narrative client configuration
#[derive(Debug, Clone)]
pub struct NarrativeClientConfig {
    pub api_key: String,
    pub model: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl NarrativeClientConfig {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Configuration union for the backend factory.
pub enum BackendConfig {
    Gemini(NarrativeClientConfig),
    GeminiFallback(NarrativeClientConfig),
    Disabled,
}

/// Create the appropriate backend from configuration.
pub fn create_backend(
    config: BackendConfig,
) -> Result<Box<dyn NarrativeBackend>, NarrativeError> {
    match config {
        BackendConfig::Gemini(c) => Ok(Box::new(GeminiNarrativeClient::new(c)?)),
        BackendConfig::GeminiFallback(c) => Ok(Box::new(FallbackNarrativeClient::new(c)?)),
        BackendConfig::Disabled => Ok(Box::new(DisabledNarrativeClient)),
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiNarrativeClient
// ============================================================================

/// Gemini narrative client — calls the Gemini generateContent API.
#[derive(Debug, Clone)]
pub struct GeminiNarrativeClient {
    client: Client,
    config: NarrativeClientConfig,
    base_url: String,
}

impl GeminiNarrativeClient {
    pub fn new(config: NarrativeClientConfig) -> Result<Self, NarrativeError> {
        if config.api_key.is_empty() {
            return Err(NarrativeError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: NarrativeClientConfig,
        base_url: String,
    ) -> Result<Self, NarrativeError> {
        if config.api_key.is_empty() {
            return Err(NarrativeError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Draft narrative text with retries (direct call, returns raw String)
    pub async fn narrate_raw(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let prompt = request.prompt();
        let result = Retry::spawn(retry_strategy, || self.narrate_once(&prompt)).await;

        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All narrative retry attempts failed"
                );
                Err(NarrativeError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn narrate_once(&self, prompt: &str) -> Result<String, NarrativeError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(NarrativeError::Api { code, message });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text = gemini_response
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(NarrativeError::MissingCandidate)?;

        Ok(text)
    }
}

#[async_trait]
impl NarrativeBackend for GeminiNarrativeClient {
    async fn narrate(&self, request: &NarrativeRequest) -> Result<Option<String>, NarrativeError> {
        self.narrate_raw(request).await.map(Some)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// FallbackNarrativeClient
// ============================================================================

/// Wraps `GeminiNarrativeClient`. On any error, logs a warning and returns
/// `Ok(None)` so the caller falls back to the phrase-table generator.
pub struct FallbackNarrativeClient {
    inner: GeminiNarrativeClient,
}

impl FallbackNarrativeClient {
    pub fn new(config: NarrativeClientConfig) -> Result<Self, NarrativeError> {
        Ok(Self {
            inner: GeminiNarrativeClient::new(config)?,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(
        config: NarrativeClientConfig,
        base_url: String,
    ) -> Result<Self, NarrativeError> {
        Ok(Self {
            inner: GeminiNarrativeClient::with_base_url(config, base_url)?,
        })
    }
}

#[async_trait]
impl NarrativeBackend for FallbackNarrativeClient {
    async fn narrate(&self, request: &NarrativeRequest) -> Result<Option<String>, NarrativeError> {
        match self.inner.narrate_raw(request).await {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Gemini narrative failed — falling back to phrase-table text"
                );
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "gemini-fallback"
    }
}

// ============================================================================
// DisabledNarrativeClient
// ============================================================================

/// Backend used when no narrative API is configured; every call yields
/// `Ok(None)` and the caller's phrase-table fallback supplies the text.
pub struct DisabledNarrativeClient;

#[async_trait]
impl NarrativeBackend for DisabledNarrativeClient {
    async fn narrate(&self, _request: &NarrativeRequest) -> Result<Option<String>, NarrativeError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

// ============================================================================
// TESTS
// ============================================================================
