//! Parsed-document cache.
//!
//! Process-wide map from article file path to its parsed `SessionRecord`.
//! The cache is a service object constructed once at startup with the
//! configured TTL and shared by reference; there are no ambient globals.
//! A TTL of zero is an explicit disabled mode (the deployed default): every
//! `get` misses and the caller re-reads and re-parses the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::SessionRecord;

struct CacheEntry {
    record: SessionRecord,
    loaded_at: Instant,
}

pub struct DocumentCache {
    ttl: Duration,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl DocumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Snapshot of the cached record for `path`, or `None` on miss.
    /// An entry older than the TTL counts as a miss; the caller is expected
    /// to re-parse and `put` a fresh entry.
    pub fn get(&self, path: &Path) -> Option<SessionRecord> {
        if !self.enabled() {
            return None;
        }
        let entries = self.entries.lock().expect("document cache poisoned");
        let entry = entries.get(path)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.record.clone())
    }

    pub fn put(&self, path: &Path, record: SessionRecord) {
        if !self.enabled() {
            return;
        }
        let mut entries = self.entries.lock().expect("document cache poisoned");
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                record,
                loaded_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, path: &Path) {
        if !self.enabled() {
            return;
        }
        let mut entries = self.entries.lock().expect("document cache poisoned");
        entries.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> SessionRecord {
        SessionRecord::empty(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
    }

    #[test]
    fn zero_ttl_always_misses() {
        let cache = DocumentCache::disabled();
        let path = Path::new("articles/2024-03-11.md");
        cache.put(path, record());
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn entry_is_served_within_ttl() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let path = Path::new("articles/2024-03-11.md");
        cache.put(path, record());
        assert_eq!(cache.get(path), Some(record()));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = DocumentCache::new(Duration::from_millis(20));
        let path = Path::new("articles/2024-03-11.md");
        cache.put(path, record());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let path = Path::new("articles/2024-03-11.md");
        cache.put(path, record());
        cache.invalidate(path);
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn one_entry_per_path() {
        let cache = DocumentCache::new(Duration::from_secs(60));
        let path = Path::new("articles/2024-03-11.md");
        let mut updated = record();
        updated.morning_open.index = Some(1302.75);
        cache.put(path, record());
        cache.put(path, updated.clone());
        assert_eq!(cache.get(path), Some(updated));
    }
}
