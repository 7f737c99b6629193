// Page cache
// Short-lived whole-page cache for the home listing

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub const INDEX_PAGE_PREFIX: &str = "index_page";

#[derive(Debug, Clone)]
struct Entry {
    body: String,
    expires_at: Instant,
}

/// Rendered pages keyed by string, each living for `ttl` after it was stored.
#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        PageCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Home page key: the request path with query, and who is looking at it.
    pub fn index_key(path_and_query: &str, viewer_id: Option<i64>) -> String {
        match viewer_id {
            Some(id) => format!("{}:{}:user-{}", INDEX_PAGE_PREFIX, path_and_query, id),
            None => format!("{}:{}:anonymous", INDEX_PAGE_PREFIX, path_and_query),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, body: impl Into<String>) {
        self.set_at(key.into(), body.into(), Instant::now());
    }

    /// Drops every entry, expired or not.
    pub fn clear(&self) {
        let mut entries = self.lock();
        debug!("Clearing {} cached pages", entries.len());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_at(&self, key: String, body: String, now: Instant) {
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            Entry {
                body,
                expires_at: now + self.ttl,
            },
        );
    }

    // A panic while holding the lock leaves the map itself intact.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
