use moka::future::Cache;
use std::time::Duration;

use crate::config::Settings;

/// Bearer tokens keyed by service account and scope.
///
/// The TTL must stay below the provider's token lifetime so a cached
/// token is never presented after it expired upstream.
#[derive(Clone)]
pub struct TokenCache {
    tokens: Cache<String, String>,
}

impl TokenCache {
    pub fn new(settings: &Settings) -> Self {
        Self::with_ttl(Duration::from_secs(settings.token_cache_ttl_secs))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }

    pub fn key(client_email: &str, scope: &str) -> String {
        format!("{}|{}", client_email, scope)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.tokens.get(key).await
    }

    pub async fn insert(&self, key: String, token: String) {
        self.tokens.insert(key, token).await;
    }

    /// Drop a token the provider rejected.
    pub async fn invalidate(&self, key: &str) {
        self.tokens.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = TokenCache::with_ttl(Duration::from_secs(60));
        let key = TokenCache::key("svc@example.iam.gserviceaccount.com", "scope");
        cache.insert(key.clone(), "ya29.token".to_string()).await;
        assert_eq!(cache.get(&key).await, Some("ya29.token".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let cache = TokenCache::with_ttl(Duration::from_secs(60));
        assert_eq!(cache.get("nobody|scope").await, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = TokenCache::with_ttl(Duration::from_secs(60));
        cache.insert("k".to_string(), "t".to_string()).await;
        cache.invalidate("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = TokenCache::with_ttl(Duration::from_millis(50));
        cache.insert("k".to_string(), "t".to_string()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn test_key_includes_scope() {
        assert_ne!(TokenCache::key("a", "s1"), TokenCache::key("a", "s2"));
    }
}
