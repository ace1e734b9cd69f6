pub mod ai;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod markdown;
pub mod models;
pub mod narrative;
pub mod store;

pub use ai::{
    create_backend, BackendConfig, DisabledNarrativeClient, FallbackNarrativeClient,
    GeminiNarrativeClient, NarrativeBackend, NarrativeClientConfig, NarrativeError,
    NarrativeRequest,
};
pub use cache::DocumentCache;
pub use config::TaladConfig;
pub use error::TaladError;
pub use markdown::MarkdownCodec;
pub use models::{SessionRecord, SessionSlot, SlotName, SlotUpdate};
pub use store::ArticleStore;
