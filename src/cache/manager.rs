use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::LeaveRequest;

/// Consider cache stale after 1 hour.
/// Balances freshness with reducing unnecessary API calls for slowly-changing data.
const CACHE_STALE_MINUTES: i64 = 60;

/// The single logical key holding the serialized leave collection.
const LEAVES_KEY: &str = "leaves";

#[derive(Debug, Clone, Serialize, Deserialize)]
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

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.cache_path(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    // ===== Leave collection =====

    /// Load the cached leave collection.
    /// A parse failure surfaces as an error; the registry treats it as
    /// absent data, never as a crash.
    pub fn load_leaves(&self) -> Result<Option<CachedData<Vec<LeaveRequest>>>> {
        self.load(LEAVES_KEY)
    }

    /// Overwrite the cached collection wholesale. Never a partial patch, so
    /// a crash mid-sequence leaves the cache stale but well-formed.
    pub fn save_leaves(&self, leaves: &[LeaveRequest]) -> Result<()> {
        self.save(LEAVES_KEY, &leaves)
    }

    pub fn clear_leaves(&self) -> Result<()> {
        self.remove(LEAVES_KEY)
    }

    /// Whether the cached collection is stale (or missing, or unreadable).
    pub fn leaves_stale(&self) -> bool {
        match self.load_leaves() {
            Ok(Some(cached)) => cached.is_stale(),
            _ => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_cache() -> CacheManager {
        let dir = std::env::temp_dir().join(format!(
            "hostelpass-cache-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        CacheManager::new(dir).expect("temp cache dir")
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(CACHE_STALE_MINUTES + 1);
        assert!(old.is_stale());
    }

    #[test]
    fn test_cached_data_age_minutes() {
        let cached = CachedData::new(vec![1]);
        // Should be 0 or very close to 0
        assert!(cached.age_minutes() <= 1);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let cache = temp_cache();
        assert!(cache.load_leaves().unwrap().is_none());

        cache.save_leaves(&[]).unwrap();
        let cached = cache.load_leaves().unwrap().expect("cached collection");
        assert!(cached.data.is_empty());
        assert!(!cached.is_stale());
    }

    #[test]
    fn test_clear_removes_collection() {
        let cache = temp_cache();
        cache.save_leaves(&[]).unwrap();
        cache.clear_leaves().unwrap();
        assert!(cache.load_leaves().unwrap().is_none());
        assert!(cache.leaves_stale());
    }

    #[test]
    fn test_malformed_cache_is_an_error_not_a_panic() {
        let cache = temp_cache();
        std::fs::write(cache.cache_path(LEAVES_KEY), "not json {{{").unwrap();
        assert!(cache.load_leaves().is_err());
        assert!(cache.leaves_stale());
    }
}
