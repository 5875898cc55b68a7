use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }

    pub fn age_display(&self) -> String {
        let seconds = self.age().num_seconds();
        if seconds < 60 {
            // Also covers clock skew
            "just now".to_string()
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else {
            format!("{}h ago", seconds / 3600)
        }
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() <= max_age
    }
}

/// Thread-safe map from query key to the last response seen for it.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, CachedData<serde_json::Value>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedData<serde_json::Value>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached value for `key` if it is younger than `max_age`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let mut entries = self.lock();
        let cached = entries.get(key)?;
        if !cached.is_fresh(max_age) {
            debug!(key, age = %cached.age_display(), "Cache entry stale");
            return None;
        }
        match serde_json::from_value(cached.data.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Dropping undecodable cache entry");
                entries.remove(key);
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(data) => {
                self.lock().insert(key.to_string(), CachedData::new(data));
            }
            Err(e) => debug!(key, error = %e, "Value not cacheable"),
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop `prefix` itself and every `prefix:...` key.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let nested = format!("{}:", prefix);
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| key != prefix && !key.starts_with(&nested));
        debug!(prefix, removed = before - entries.len(), "Invalidated cache entries");
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// How long ago `key` was cached, for display.
    pub fn age_display(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|cached| cached.age_display())
    }
}

// ============================================================================
// Tests
// ============================================================================
