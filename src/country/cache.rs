use moka::future::Cache;
use std::time::Duration;

const MAX_CACHED_ADDRESSES: u64 = 100_000;

/// IP address -> country code cache with a fixed time to live.
///
/// Expired entries are never returned; they are evicted lazily.
#[derive(Clone)]
pub struct GeoCache {
    entries: Cache<String, String>,
}

impl GeoCache {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_CACHED_ADDRESSES)
            .time_to_live(ttl)
            .build();

        Self { entries }
    }

    pub async fn get(&self, ip: &str) -> Option<String> {
        self.entries.get(ip).await
    }

    pub async fn insert(&self, ip: &str, country: &str) {
        self.entries.insert(ip.to_string(), country.to_string()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_cached_country() {
        let cache = GeoCache::new(Duration::from_secs(60));
        cache.insert("203.0.113.1", "nl").await;

        assert_eq!(cache.get("203.0.113.1").await.as_deref(), Some("nl"));
        assert_eq!(cache.get("203.0.113.2").await, None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = GeoCache::new(Duration::from_millis(50));
        cache.insert("203.0.113.1", "nl").await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("203.0.113.1").await, None);
    }
}
