//! Notification forwarder — pushes publish events to the messaging bot.
//!
//! LINE-Notify-style webhook: form-encoded `message` POST with a bearer
//! token. Notifications are fire-and-forget; they run in tokio::spawn AFTER
//! the HTTP response is sent and a failure only produces a warning, never a
//! failed publish.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

use talad_core::config::NotifyConfig;

const BOT_TOKEN_ENV: &str = "LINE_NOTIFY_TOKEN";

pub struct Notifier {
    client: Client,
    webhook_url: String,
    token: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: String, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
            token,
        })
    }

    /// Build from config, reading the bot token from the environment.
    /// Missing token or `enabled = false` yields a disabled notifier.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let token = std::env::var(BOT_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::info!(
                "Notifications enabled in config but {} is unset; forwarding disabled",
                BOT_TOKEN_ENV
            );
            return Ok(Self::disabled());
        }
        Self::new(config.webhook_url.clone(), token)
    }

    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            webhook_url: String::new(),
            token: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some() && !self.webhook_url.is_empty()
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let token = match &self.token {
            Some(token) if !self.webhook_url.is_empty() => token,
            _ => {
                tracing::debug!("Notifier disabled, dropping message");
                return Ok(());
            }
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .bearer_auth(token)
            .form(&[("message", message)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("bot webhook returned {}: {}", status, body);
        }
        Ok(())
    }

    /// Spawn an async task to forward the message; never blocks the caller.
    pub fn spawn_send(self: &Arc<Self>, message: String) {
        if !self.is_enabled() {
            return;
        }
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            match notifier.send(&message).await {
                Ok(()) => tracing::debug!("Notification forwarded"),
                Err(e) => tracing::warn!(error = %e, "Notification forward failed"),
            }
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================
