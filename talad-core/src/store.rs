//! Article store: the markdown files on disk plus the parsed-document cache.
//!
//! One `ArticleStore` is constructed at startup and shared by `Arc` across
//! HTTP handlers. Slot updates run under a single update lock that spans the
//! whole read-modify-write cycle: the current on-disk text is re-read inside
//! the lock, merged, and written back, so two concurrent updates to sibling
//! slots of the same date can never drop each other. The lock also makes the
//! merge safe to run after an arbitrarily delayed AI response, because the
//! merge never trusts an in-memory copy of the document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::cache::DocumentCache;
use crate::error::TaladError;
use crate::markdown::MarkdownCodec;
use crate::models::{SessionRecord, SlotName, SlotUpdate};

pub struct ArticleStore {
    dir: PathBuf,
    codec: MarkdownCodec,
    cache: DocumentCache,
    update_lock: Mutex<()>,
}

impl ArticleStore {
    pub fn new(dir: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            codec: MarkdownCodec::new(),
            cache: DocumentCache::new(cache_ttl),
            update_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn article_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.md", date))
    }

    /// Load the day's record, via the cache when enabled.
    ///
    /// A missing file and a structurally unrecognizable file both degrade to
    /// an empty record: either way the day has no usable article yet and the
    /// publish path must still be able to create one. Real IO failures
    /// propagate.
    pub async fn load(&self, date: NaiveDate) -> Result<SessionRecord, TaladError> {
        let path = self.article_path(date);
        if let Some(record) = self.cache.get(&path) {
            return Ok(record);
        }

        let record = match self.read_text(&path).await? {
            Some(text) => self.parse_or_empty(date, &text),
            None => SessionRecord::empty(date),
        };

        self.cache.put(&path, record.clone());
        Ok(record)
    }

    /// Merge one slot update into the day's document and persist it.
    ///
    /// Holds the update lock for the full read-modify-write cycle and always
    /// re-reads the current on-disk text before merging.
    pub async fn update_slot(
        &self,
        date: NaiveDate,
        slot: SlotName,
        update: &SlotUpdate,
    ) -> Result<SessionRecord, TaladError> {
        let _guard = self.update_lock.lock().await;

        let path = self.article_path(date);
        let existing = self.read_text(&path).await?.unwrap_or_default();
        let merged = self.codec.merge_slot(&existing, date, slot, update);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &merged).await?;

        let record = self.parse_or_empty(date, &merged);
        self.cache.put(&path, record.clone());

        tracing::info!(date = %date, slot = %slot, "Persisted session update");
        Ok(record)
    }

    fn parse_or_empty(&self, date: NaiveDate, text: &str) -> SessionRecord {
        match self.codec.parse(date, text) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(date = %date, error = %e, "Unparsable article, treating as empty");
                SessionRecord::empty(date)
            }
        }
    }

    async fn read_text(&self, path: &Path) -> Result<Option<String>, TaladError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    fn update(index: f64, change: f64) -> SlotUpdate {
        SlotUpdate {
            index,
            change,
            highlights: None,
            narrative: None,
        }
    }

    #[tokio::test]
    async fn load_of_missing_file_is_empty_record() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path(), Duration::ZERO);
        let record = store.load(date()).await.unwrap();
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn update_creates_file_and_returns_record() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path(), Duration::ZERO);

        let record = store
            .update_slot(
                date(),
                SlotName::MorningOpen,
                &SlotUpdate {
                    index: 1302.75,
                    change: 16.49,
                    highlights: Some("*BANK +68*".to_string()),
                    narrative: Some("Strong open.".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(record.morning_open.index, Some(1302.75));
        assert!(store.article_path(date()).exists());

        let loaded = store.load(date()).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn sequential_updates_merge_into_one_document() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path(), Duration::ZERO);

        store
            .update_slot(date(), SlotName::MorningOpen, &update(1302.75, 16.49))
            .await
            .unwrap();
        let record = store
            .update_slot(date(), SlotName::AfternoonClose, &update(1291.0, 8.62))
            .await
            .unwrap();

        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.afternoon_close.index, Some(1291.0));
        assert_eq!(record.slots_filled(), 2);
    }

    #[tokio::test]
    async fn concurrent_sibling_updates_both_persist() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ArticleStore::new(dir.path(), Duration::ZERO));

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_slot(date(), SlotName::MorningOpen, &update(1302.75, 16.49))
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_slot(date(), SlotName::AfternoonClose, &update(1291.0, 8.62))
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let record = store.load(date()).await.unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
        assert_eq!(record.afternoon_close.index, Some(1291.0));
    }

    #[tokio::test]
    async fn cached_load_skips_reparse_within_ttl() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path(), Duration::from_secs(60));

        store
            .update_slot(date(), SlotName::MorningOpen, &update(1302.75, 16.49))
            .await
            .unwrap();

        // Clobber the file behind the cache's back: a cached load must still
        // serve the snapshot it parsed at write time.
        tokio::fs::write(store.article_path(date()), "scribbled over").await.unwrap();
        let record = store.load(date()).await.unwrap();
        assert_eq!(record.morning_open.index, Some(1302.75));
    }

    #[tokio::test]
    async fn unparsable_file_degrades_to_empty_record() {
        let dir = TempDir::new().unwrap();
        let store = ArticleStore::new(dir.path(), Duration::ZERO);

        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(store.article_path(date()), "no headings here\n")
            .await
            .unwrap();

        let record = store.load(date()).await.unwrap();
        assert!(record.is_empty());
    }
}
