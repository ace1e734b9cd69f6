use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TaladConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub articles: ArticlesConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArticlesConfig {
    /// Directory holding one `YYYY-MM-DD.md` file per trading day.
    pub dir: String,
    /// Parsed-document cache TTL. 0 disables caching entirely (the deployed
    /// default): every load re-reads and re-parses the file.
    #[serde(default)]
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NarrativeConfig {
    /// One of "disabled", "gemini", "gemini-fallback".
    pub backend: String,
    pub model: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            backend: "disabled".to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub webhook_url: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: "https://notify-api.line.me/api/notify".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8970,
        }
    }
}

impl TaladConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
